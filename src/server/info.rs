//! Static exchange-info blob.
//!
//! Read once at startup, validated as JSON, then served byte-for-byte for
//! every `exchange_info` command. Process-global and read-only after init.

use std::path::Path;
use std::sync::OnceLock;

use crate::error::ExchangeError;

static EXCHANGE_INFO: OnceLock<String> = OnceLock::new();

/// Loads the blob. A read or parse failure here is fatal to startup.
pub fn load(path: &Path) -> Result<&'static str, ExchangeError> {
    if let Some(blob) = EXCHANGE_INFO.get() {
        return Ok(blob);
    }
    let raw = std::fs::read_to_string(path).map_err(|e| {
        ExchangeError::Config(format!("read exchange info {}: {e}", path.display()))
    })?;
    serde_json::from_str::<serde::de::IgnoredAny>(&raw).map_err(|e| {
        ExchangeError::Config(format!(
            "exchange info {} is not valid JSON: {e}",
            path.display()
        ))
    })?;
    Ok(EXCHANGE_INFO.get_or_init(|| raw))
}

pub fn get() -> Result<&'static str, ExchangeError> {
    EXCHANGE_INFO
        .get()
        .map(String::as_str)
        .ok_or(ExchangeError::NoData)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn load_serves_verbatim_and_rejects_garbage() {
        let mut bad = tempfile::NamedTempFile::new().unwrap();
        write!(bad, "{{not json").unwrap();
        assert!(load(bad.path()).is_err());

        let raw = r#"{"timezone":"UTC","symbols":[{"symbol":"ETHUSDT"}]}"#;
        let mut good = tempfile::NamedTempFile::new().unwrap();
        write!(good, "{raw}").unwrap();
        assert_eq!(load(good.path()).unwrap(), raw);
        assert_eq!(get().unwrap(), raw);

        // once set, later loads keep the first blob
        assert_eq!(load(bad.path()).unwrap(), raw);
    }
}
