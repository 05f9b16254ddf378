//! C FFI surface for tilawa.
//!
//! Pattern: opaque EngineHandle + C strings + JSON serialization.
//! Commands go in as `{"action": ...}` JSON; state comes back as JSON.
//!
//! Flutter/Dart calls these via `dart:ffi`. Any platform with C FFI
//! (Swift, Kotlin, Python, Node.js) can use this.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::path::PathBuf;
use std::ptr;

use tilawa_core::{
    paths, Engine, MixerCommand, NarrationEvent, PlayerCommand, ThemeKey, PRESETS, RECITERS,
    THEMES,
};

// ---------------------------------------------------------------------------
// Error handling (thread-local last error)
// ---------------------------------------------------------------------------

thread_local! {
    static LAST_ERROR: RefCell<Option<String>> = const { RefCell::new(None) };
}

fn set_error(msg: String) {
    LAST_ERROR.with(|cell| *cell.borrow_mut() = Some(msg));
}

fn clear_error() {
    LAST_ERROR.with(|cell| *cell.borrow_mut() = None);
}

/// Returns the last error message (caller frees with `tilawa_string_free`).
#[no_mangle]
pub extern "C" fn tilawa_last_error() -> *mut c_char {
    LAST_ERROR.with(|cell| {
        cell.borrow_mut()
            .take()
            .and_then(|s| CString::new(s).ok())
            .map(|s| s.into_raw())
            .unwrap_or(ptr::null_mut())
    })
}

/// Frees a string returned from tilawa FFI.
///
/// # Safety
/// Must be a pointer returned from this FFI and not already freed.
#[no_mangle]
pub unsafe extern "C" fn tilawa_string_free(ptr: *mut c_char) {
    if !ptr.is_null() {
        let _ = CString::from_raw(ptr);
    }
}

// ---------------------------------------------------------------------------
// Opaque handle
// ---------------------------------------------------------------------------

#[repr(C)]
pub struct EngineHandle {
    _private: [u8; 0],
}

struct EngineHandleInner {
    engine: Engine,
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Sets the data root directory (settings, preferences, ambient sounds).
///
/// # Safety
/// `path` must be a valid null-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn tilawa_set_root(path: *const c_char) -> i32 {
    clear_error();
    match read_cstr(path) {
        Ok(p) => {
            std::env::set_var(paths::ROOT_ENV, p);
            1
        }
        Err(e) => {
            set_error(e);
            0
        }
    }
}

/// Opens the engine with native audio output. Returns an opaque handle.
#[no_mangle]
pub extern "C" fn tilawa_open() -> *mut EngineHandle {
    clear_error();
    open_with(Engine::open)
}

/// Opens the engine without audio output; the host renders sound itself.
#[no_mangle]
pub extern "C" fn tilawa_open_headless() -> *mut EngineHandle {
    clear_error();
    open_with(Engine::headless)
}

fn open_with(
    boot: impl FnOnce(&std::path::Path) -> tilawa_core::Result<Engine>,
) -> *mut EngineHandle {
    let root: PathBuf = paths::data_root();
    if let Err(e) = std::fs::create_dir_all(&root) {
        set_error(format!("cannot create {}: {}", root.display(), e));
        return ptr::null_mut();
    }
    log::debug!("tilawa: opening engine at {}", root.display());
    match boot(&root) {
        Ok(engine) => {
            engine.start();
            Box::into_raw(Box::new(EngineHandleInner { engine })) as *mut EngineHandle
        }
        Err(e) => {
            set_error(e.to_string());
            ptr::null_mut()
        }
    }
}

/// Closes the engine and releases all resources.
#[no_mangle]
pub extern "C" fn tilawa_close(handle: *mut EngineHandle) {
    if !handle.is_null() {
        unsafe {
            let inner = Box::from_raw(handle as *mut EngineHandleInner);
            inner.engine.shutdown();
        }
    }
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// Apply a player command, e.g. `{"action":"select_juz","juz":5}`.
/// Returns 1 on success, 0 on error.
#[no_mangle]
pub extern "C" fn tilawa_player_command(handle: *mut EngineHandle, json: *const c_char) -> i32 {
    clear_error();
    let engine = match engine_ref(handle) {
        Ok(e) => e,
        Err(e) => return err_zero(e),
    };
    let cmd: PlayerCommand = match read_json(json, "command") {
        Ok(cmd) => cmd,
        Err(e) => return err_zero(e),
    };
    match engine.command(cmd) {
        Ok(()) => 1,
        Err(e) => err_zero(e.to_string()),
    }
}

/// Current player snapshot as JSON (caller frees).
#[no_mangle]
pub extern "C" fn tilawa_player_state(handle: *mut EngineHandle) -> *mut c_char {
    clear_error();
    match engine_ref(handle) {
        Ok(engine) => json_to_cstr(&engine.player_state()),
        Err(e) => err_null(e),
    }
}

/// Report a notification from the host's own narration output, e.g.
/// `{"event":"ended"}` or `{"event":"duration_known","seconds":41.2}`.
/// Headless engines only. Returns 1 on success, 0 on error.
#[no_mangle]
pub extern "C" fn tilawa_player_event(handle: *mut EngineHandle, json: *const c_char) -> i32 {
    clear_error();
    let engine = match engine_ref(handle) {
        Ok(e) => e,
        Err(e) => return err_zero(e),
    };
    let event: NarrationEvent = match read_json(json, "event") {
        Ok(event) => event,
        Err(e) => return err_zero(e),
    };
    match engine.report_narration_event(event) {
        Ok(()) => 1,
        Err(e) => err_zero(e.to_string()),
    }
}

/// Ayahs of the loaded juz as a JSON array (caller frees).
#[no_mangle]
pub extern "C" fn tilawa_ayahs(handle: *mut EngineHandle) -> *mut c_char {
    clear_error();
    match engine_ref(handle) {
        Ok(engine) => json_to_cstr(&engine.ayahs()),
        Err(e) => err_null(e),
    }
}

// ---------------------------------------------------------------------------
// Mixer
// ---------------------------------------------------------------------------

/// Apply a mixer command, e.g. `{"action":"apply_preset","preset":"calm"}`.
/// Returns 1 on success, 0 on error.
#[no_mangle]
pub extern "C" fn tilawa_mixer_command(handle: *mut EngineHandle, json: *const c_char) -> i32 {
    clear_error();
    let engine = match engine_ref(handle) {
        Ok(e) => e,
        Err(e) => return err_zero(e),
    };
    let cmd: MixerCommand = match read_json(json, "command") {
        Ok(cmd) => cmd,
        Err(e) => return err_zero(e),
    };
    match engine.mixer_command(cmd) {
        Ok(()) => 1,
        Err(e) => err_zero(e.to_string()),
    }
}

/// Current mixer snapshot as JSON (caller frees).
#[no_mangle]
pub extern "C" fn tilawa_mixer_state(handle: *mut EngineHandle) -> *mut c_char {
    clear_error();
    match engine_ref(handle) {
        Ok(engine) => json_to_cstr(&engine.mixer_state()),
        Err(e) => err_null(e),
    }
}

/// Ambient channels that failed to start since the last call, as JSON.
#[no_mangle]
pub extern "C" fn tilawa_mixer_failures(handle: *mut EngineHandle) -> *mut c_char {
    clear_error();
    match engine_ref(handle) {
        Ok(engine) => json_to_cstr(&engine.take_mixer_failures()),
        Err(e) => err_null(e),
    }
}

// ---------------------------------------------------------------------------
// Catalogs
// ---------------------------------------------------------------------------

#[no_mangle]
pub extern "C" fn tilawa_reciters() -> *mut c_char {
    clear_error();
    json_to_cstr(&RECITERS)
}

#[no_mangle]
pub extern "C" fn tilawa_presets() -> *mut c_char {
    clear_error();
    json_to_cstr(&PRESETS)
}

#[no_mangle]
pub extern "C" fn tilawa_themes() -> *mut c_char {
    clear_error();
    let themes: Vec<serde_json::Value> = THEMES.iter().map(|t| t.to_json()).collect();
    json_to_cstr(&themes)
}

// ---------------------------------------------------------------------------
// Theme
// ---------------------------------------------------------------------------

/// Selected theme as `{"key","name","description"}` JSON (caller frees).
#[no_mangle]
pub extern "C" fn tilawa_theme(handle: *mut EngineHandle) -> *mut c_char {
    clear_error();
    match engine_ref(handle) {
        Ok(engine) => json_to_cstr(&engine.theme().to_json()),
        Err(e) => err_null(e),
    }
}

/// Select and persist a theme by key. Returns 1 on success, 0 on error.
#[no_mangle]
pub extern "C" fn tilawa_set_theme(handle: *mut EngineHandle, key: *const c_char) -> i32 {
    clear_error();
    let engine = match engine_ref(handle) {
        Ok(e) => e,
        Err(e) => return err_zero(e),
    };
    let theme: ThemeKey = match read_cstr(key).and_then(|k| k.parse()) {
        Ok(t) => t,
        Err(e) => return err_zero(e),
    };
    match engine.set_theme(theme) {
        Ok(()) => 1,
        Err(e) => err_zero(e.to_string()),
    }
}

/// FFI ABI version.
#[no_mangle]
pub extern "C" fn tilawa_version() -> u32 {
    1
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn engine_ref<'a>(handle: *mut EngineHandle) -> Result<&'a Engine, String> {
    if handle.is_null() {
        return Err("null engine handle".into());
    }
    let inner = unsafe { &*(handle as *mut EngineHandleInner) };
    Ok(&inner.engine)
}

fn read_cstr(ptr: *const c_char) -> Result<String, String> {
    if ptr.is_null() {
        return Err("null string pointer".into());
    }
    unsafe {
        CStr::from_ptr(ptr)
            .to_str()
            .map(String::from)
            .map_err(|_| "invalid utf-8".into())
    }
}

fn read_json<T: serde::de::DeserializeOwned>(ptr: *const c_char, what: &str) -> Result<T, String> {
    let text = read_cstr(ptr)?;
    serde_json::from_str(&text).map_err(|e| format!("invalid {}: {}", what, e))
}

fn json_to_cstr<T: serde::Serialize + ?Sized>(value: &T) -> *mut c_char {
    match serde_json::to_string(value) {
        Ok(json) => to_cstr(json),
        Err(e) => err_null(e.to_string()),
    }
}

fn to_cstr(s: String) -> *mut c_char {
    CString::new(s)
        .map(|c| c.into_raw())
        .unwrap_or(ptr::null_mut())
}

fn err_null(msg: String) -> *mut c_char {
    set_error(msg);
    ptr::null_mut()
}

fn err_zero(msg: String) -> i32 {
    set_error(msg);
    0
}

// ---------------------------------------------------------------------------
// FFI Integration Tests
// ---------------------------------------------------------------------------
