use std::fmt;

use super::params::ExportParameters;

/// Blobs larger than this are split into numbered parts by the service.
pub const SIZE_LIMIT_BYTES: u64 = 1 << 30;

pub struct ExportCommand {
    text: String,
    redacted: String,
}

impl ExportCommand {
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The command with the storage secret masked, safe for logs.
    pub fn redacted(&self) -> &str {
        &self.redacted
    }
}

impl fmt::Debug for ExportCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportCommand")
            .field("text", &self.redacted)
            .finish()
    }
}

pub fn render(query: &str, params: &ExportParameters) -> ExportCommand {
    let suffix = params.access_key().connection_suffix();
    ExportCommand {
        text: build(query, params, &suffix),
        redacted: build(query, params, params.access_key().redacted_suffix()),
    }
}

fn build(query: &str, params: &ExportParameters, key_suffix: &str) -> String {
    // `compressed` and `compressionType` only work as a pair.
    let compressed = if params.compress() { "compressed\n" } else { "" };
    let compression_type = if params.compress() {
        "    compressionType=gzip,\n"
    } else {
        ""
    };

    format!(
        r#".export
{compressed}to csv (h@"{storage_uri}{key_suffix}")
with (
    sizeLimit={size_limit},
    namePrefix={name_prefix},
    fileExtension=csv,
{compression_type}    includeHeaders=firstFile,
    encoding=UTF8NoBOM,
    distributed=false
)
<|
{query}"#,
        compressed = compressed,
        storage_uri = params.storage_uri(),
        key_suffix = key_suffix,
        size_limit = SIZE_LIMIT_BYTES,
        name_prefix = params.name_prefix(),
        compression_type = compression_type,
        query = query,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageKey;

    const URI: &str = "https://acct.blob.core.windows.net/cont/folder";

    fn params(prefix: &str, compress: bool) -> ExportParameters {
        ExportParameters::new(URI, StorageKey::parse("c2VjcmV0").unwrap(), prefix, compress)
            .unwrap()
    }

    #[test]
    fn test_uncompressed_command() {
        let cmd = render("print('hi')", &params("t1", false));
        let text = cmd.text();

        assert!(text.starts_with(".export\nto csv"));
        assert!(text.contains(".export"));
        assert!(text.contains("to csv (h@\"https://acct.blob.core.windows.net/cont/folder;c2VjcmV0\")"));
        assert!(text.contains("namePrefix=t1"));
        assert!(!text.contains("compressed"));
        assert!(!text.contains("compressionType"));
    }

    #[test]
    fn test_compressed_command_sets_both_markers() {
        let text = render("print('hi')", &params("t1", true)).text().to_string();

        assert!(text.starts_with(".export\ncompressed\nto csv"));
        assert!(text.contains("compressionType=gzip"));
    }

    #[test]
    fn test_fixed_options_always_present() {
        for compress in [false, true] {
            let text = render("T | take 10", &params("t1", compress)).text().to_string();
            assert!(text.contains("sizeLimit=1073741824"));
            assert!(text.contains("fileExtension=csv"));
            assert!(text.contains("includeHeaders=firstFile"));
            assert!(text.contains("encoding=UTF8NoBOM"));
            assert!(text.contains("distributed=false"));
        }
    }

    #[test]
    fn test_exact_layout() {
        let text = render("StormEvents\n| take 5", &params("t1", true)).text().to_string();
        let expected = ".export
compressed
to csv (h@\"https://acct.blob.core.windows.net/cont/folder;c2VjcmV0\")
with (
    sizeLimit=1073741824,
    namePrefix=t1,
    fileExtension=csv,
    compressionType=gzip,
    includeHeaders=firstFile,
    encoding=UTF8NoBOM,
    distributed=false
)
<|
StormEvents
| take 5";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_query_embedded_once_verbatim_after_sink() {
        let query = "StormEvents\n| where State == 'TEXAS'\n| summarize count() by EventType\n";
        let text = render(query, &params("t1", false)).text().to_string();

        assert_eq!(text.matches(query).count(), 1);
        let (_, source) = text.split_once("<|\n").unwrap();
        assert_eq!(source, query);
    }

    #[test]
    fn test_render_is_deterministic() {
        let a = render("print('hi')", &params("t1", true));
        let b = render("print('hi')", &params("t1", true));
        assert_eq!(a.text(), b.text());
    }

    #[test]
    fn test_sas_key_uses_query_separator() {
        let p = ExportParameters::new(URI, StorageKey::parse("?sv=1&sig=x").unwrap(), "t1", false)
            .unwrap();
        let text = render("print('hi')", &p).text().to_string();
        assert!(text.contains("h@\"https://acct.blob.core.windows.net/cont/folder?sv=1&sig=x\""));
    }

    #[test]
    fn test_redacted_form_hides_key() {
        let cmd = render("print('hi')", &params("t1", false));
        assert!(!cmd.redacted().contains("c2VjcmV0"));
        assert!(cmd.redacted().contains("folder;****"));
        assert!(!format!("{:?}", cmd).contains("c2VjcmV0"));
    }
}
