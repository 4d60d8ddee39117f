//! Save a string as a file through a temporary object URL.

use chrono::{DateTime, Utc};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Blob, BlobPropertyBag, HtmlAnchorElement, Url};
use chat_types::{ChatError, Result};

/// `conversations-2024-03-01T12-00-00Z.json`. Colons are not allowed in
/// file names on every platform.
pub fn export_file_name(at: DateTime<Utc>) -> String {
    format!("conversations-{}.json", at.format("%Y-%m-%dT%H-%M-%SZ"))
}

fn js_error(e: JsValue) -> ChatError {
    ChatError::JsInterop(format!("{:?}", e))
}

pub fn download_json(file_name: &str, json: &str) -> Result<()> {
    let document = web_sys::window()
        .and_then(|w| w.document())
        .ok_or_else(|| ChatError::JsInterop("No document".to_string()))?;

    let parts = js_sys::Array::of1(&JsValue::from_str(json));
    let options = BlobPropertyBag::new();
    options.set_type("application/json");
    let blob = Blob::new_with_str_sequence_and_options(&parts, &options).map_err(js_error)?;
    let url = Url::create_object_url_with_blob(&blob).map_err(js_error)?;

    let anchor: HtmlAnchorElement = document
        .create_element("a")
        .map_err(js_error)?
        .dyn_into()
        .map_err(|_| ChatError::JsInterop("<a> is not an anchor element".to_string()))?;
    anchor.set_href(&url);
    anchor.set_download(file_name);
    anchor.click();

    Url::revoke_object_url(&url).map_err(js_error)?;
    log::info!("Exported conversations to {}", file_name);
    Ok(())
}
