//! User-granted directory via the File System Access API.
//!
//! The directory handle is owned by `BrowserDirectory`; nothing is kept in
//! globals, so two sessions can point at two different directories.
//! The API is still behind web-sys's unstable flag, so the few calls we
//! need are bound here directly.

use async_trait::async_trait;
use gloo_utils::format::JsValueSerdeExt;
use js_sys::{AsyncIterator, IteratorNext, Promise};
use serde_json::json;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use chat_core::ports::{DirectoryPermission, DirectoryPort};
use chat_types::{ChatError, Result};

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_name = FileSystemDirectoryHandle)]
    #[derive(Debug, Clone)]
    pub type DirectoryHandle;

    #[wasm_bindgen(method, getter)]
    fn name(this: &DirectoryHandle) -> String;

    #[wasm_bindgen(method, js_name = getFileHandle)]
    fn get_file_handle(this: &DirectoryHandle, name: &str, options: &JsValue) -> Promise;

    #[wasm_bindgen(method, js_name = removeEntry)]
    fn remove_entry(this: &DirectoryHandle, name: &str) -> Promise;

    #[wasm_bindgen(method)]
    fn keys(this: &DirectoryHandle) -> AsyncIterator;

    #[wasm_bindgen(method, js_name = queryPermission)]
    fn query_permission(this: &DirectoryHandle, descriptor: &JsValue) -> Promise;

    #[wasm_bindgen(method, js_name = requestPermission)]
    fn request_permission(this: &DirectoryHandle, descriptor: &JsValue) -> Promise;

    #[wasm_bindgen(js_name = FileSystemFileHandle)]
    type FileHandle;

    #[wasm_bindgen(method, js_name = getFile)]
    fn get_file(this: &FileHandle) -> Promise;

    #[wasm_bindgen(method, js_name = createWritable)]
    fn create_writable(this: &FileHandle) -> Promise;

    #[wasm_bindgen(js_name = FileSystemWritableFileStream)]
    type WritableFileStream;

    #[wasm_bindgen(method)]
    fn write(this: &WritableFileStream, data: &str) -> Promise;

    #[wasm_bindgen(method)]
    fn close(this: &WritableFileStream) -> Promise;

    #[wasm_bindgen(catch, js_name = showDirectoryPicker)]
    fn show_directory_picker(options: &JsValue) -> std::result::Result<Promise, JsValue>;
}

/// `name` of a rejected DOMException, e.g. `NotFoundError`.
fn dom_error_name(e: &JsValue) -> String {
    js_sys::Reflect::get(e, &JsValue::from_str("name"))
        .ok()
        .and_then(|name| name.as_string())
        .unwrap_or_default()
}

fn to_chat_error(context: &str, e: JsValue) -> ChatError {
    match dom_error_name(&e).as_str() {
        "NotAllowedError" | "SecurityError" => {
            ChatError::StorageUnavailable(format!("{}: permission revoked", context))
        }
        "AbortError" => ChatError::StorageUnavailable(format!("{}: no directory selected", context)),
        _ => ChatError::Storage(format!("{}: {:?}", context, e)),
    }
}

fn js_value<T: serde::Serialize>(value: &T) -> Result<JsValue> {
    JsValue::from_serde(value).map_err(|e| ChatError::JsInterop(e.to_string()))
}

pub struct BrowserDirectory {
    handle: DirectoryHandle,
    label: String,
}

impl BrowserDirectory {
    /// Ask the user to pick a directory. Must run inside a user gesture.
    pub async fn pick() -> Result<Self> {
        let options = js_value(&json!({ "id": "conversations", "mode": "readwrite" }))?;
        let promise = show_directory_picker(&options).map_err(|e| {
            ChatError::StorageUnavailable(format!(
                "File System Access API not supported ({})",
                dom_error_name(&e)
            ))
        })?;
        let handle = JsFuture::from(promise)
            .await
            .map_err(|e| to_chat_error("showDirectoryPicker", e))?;
        Self::from_handle(handle)
    }

    /// Wrap a handle obtained elsewhere, e.g. one the host page kept from an
    /// earlier visit.
    pub fn from_handle(handle: JsValue) -> Result<Self> {
        if handle.is_null() || handle.is_undefined() {
            return Err(ChatError::StorageUnavailable("no directory handle".to_string()));
        }
        let handle: DirectoryHandle = handle.unchecked_into();
        let label = handle.name();
        log::info!("Conversation directory: {}", label);
        Ok(Self { handle, label })
    }

    pub fn handle(&self) -> JsValue {
        self.handle.clone().into()
    }

    /// Prompt for read-write access if it has not been granted yet.
    pub async fn request_access(&self) -> Result<DirectoryPermission> {
        let descriptor = js_value(&json!({ "mode": "readwrite" }))?;
        let state = JsFuture::from(self.handle.request_permission(&descriptor))
            .await
            .map_err(|e| to_chat_error("requestPermission", e))?;
        Ok(parse_permission(state.as_string().as_deref()))
    }

    async fn file_handle(&self, name: &str, create: bool) -> Result<Option<FileHandle>> {
        let options = js_value(&json!({ "create": create }))?;
        match JsFuture::from(self.handle.get_file_handle(name, &options)).await {
            Ok(handle) => Ok(Some(handle.unchecked_into())),
            Err(e) if dom_error_name(&e) == "NotFoundError" => Ok(None),
            Err(e) => Err(to_chat_error(name, e)),
        }
    }
}

fn parse_permission(state: Option<&str>) -> DirectoryPermission {
    match state {
        Some("granted") => DirectoryPermission::Granted,
        Some("prompt") => DirectoryPermission::Prompt,
        _ => DirectoryPermission::Denied,
    }
}

#[async_trait(?Send)]
impl DirectoryPort for BrowserDirectory {
    async fn permission(&self) -> Result<DirectoryPermission> {
        let descriptor = js_value(&json!({ "mode": "readwrite" }))?;
        let state = JsFuture::from(self.handle.query_permission(&descriptor))
            .await
            .map_err(|e| to_chat_error("queryPermission", e))?;
        Ok(parse_permission(state.as_string().as_deref()))
    }

    async fn read_file(&self, name: &str) -> Result<Option<String>> {
        let Some(handle) = self.file_handle(name, false).await? else {
            return Ok(None);
        };
        let file: web_sys::File = JsFuture::from(handle.get_file())
            .await
            .map_err(|e| to_chat_error(name, e))?
            .unchecked_into();
        let text = JsFuture::from(file.text())
            .await
            .map_err(|e| to_chat_error(name, e))?;
        text.as_string()
            .map(Some)
            .ok_or_else(|| ChatError::JsInterop(format!("{}: file text is not a string", name)))
    }

    async fn write_file(&self, name: &str, contents: &str) -> Result<()> {
        let handle = self
            .file_handle(name, true)
            .await?
            .ok_or_else(|| ChatError::Storage(format!("{}: could not create file", name)))?;
        let stream: WritableFileStream = JsFuture::from(handle.create_writable())
            .await
            .map_err(|e| to_chat_error(name, e))?
            .unchecked_into();
        JsFuture::from(stream.write(contents))
            .await
            .map_err(|e| to_chat_error(name, e))?;
        // Contents only land on disk once the stream is closed.
        JsFuture::from(stream.close())
            .await
            .map_err(|e| to_chat_error(name, e))?;
        Ok(())
    }

    async fn remove_file(&self, name: &str) -> Result<bool> {
        match JsFuture::from(self.handle.remove_entry(name)).await {
            Ok(_) => Ok(true),
            Err(e) if dom_error_name(&e) == "NotFoundError" => Ok(false),
            Err(e) => Err(to_chat_error(name, e)),
        }
    }

    async fn list_files(&self) -> Result<Vec<String>> {
        let entries = self.handle.keys();
        let mut names = Vec::new();
        loop {
            let promise = entries
                .next()
                .map_err(|e| to_chat_error(&self.label, e))?;
            let step: IteratorNext = JsFuture::from(promise)
                .await
                .map_err(|e| to_chat_error(&self.label, e))?
                .unchecked_into();
            if step.done() {
                break;
            }
            if let Some(name) = step.value().as_string() {
                names.push(name);
            }
        }
        Ok(names)
    }

    fn label(&self) -> &str {
        &self.label
    }
}
