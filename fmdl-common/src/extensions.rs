//! Extension header text embedded in the string pool
//!
//! The text follows the last string and is recognised only if it starts with
//! `X-FMDL-Extensions:` (any case). It is a list of HTTP-style header lines:
//!
//! ```text
//! X-FMDL-Extensions: mesh-splitting, vertex-loop-preservation
//! Split-Mesh-Groups: 3, 4
//! Custom-Bounding-Box-Meshes: 0
//! ```
//!
//! Keys are case-insensitive and the first occurrence wins. Per-object
//! markers list the objects they apply to by array position.

use std::fmt::Write as _;

/// Header listing which optional encodings were applied
pub const EXTENSIONS_HEADER: &str = "X-FMDL-Extensions";

/// Extension names listed in [`EXTENSIONS_HEADER`]
pub mod extension {
    pub const ANTIBLUR: &str = "antiblur";
    pub const MESH_SPLITTING: &str = "mesh-splitting";
    pub const VERTEX_LOOP_PRESERVATION: &str = "vertex-loop-preservation";
}

/// Per-mesh flags carried as positional extension headers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MeshMarker {
    /// The host supplied its own bounding box for this mesh
    CustomBoundingBox,
    /// An anti-blur companion mesh is generated from this mesh on encode
    HasAntiblur,
    /// This mesh is a generated anti-blur companion
    IsAntiblur,
}

impl MeshMarker {
    pub const ALL: [MeshMarker; 3] = [
        MeshMarker::CustomBoundingBox,
        MeshMarker::HasAntiblur,
        MeshMarker::IsAntiblur,
    ];

    pub fn header_name(self) -> &'static str {
        match self {
            MeshMarker::CustomBoundingBox => "Custom-Bounding-Box-Meshes",
            MeshMarker::HasAntiblur => "Has-Antiblur-Meshes",
            MeshMarker::IsAntiblur => "Is-Antiblur-Meshes",
        }
    }
}

/// Per-mesh-group flags carried as positional extension headers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MeshGroupMarker {
    /// The group holds the submeshes of one split mesh
    SplitMeshGroup,
}

impl MeshGroupMarker {
    pub const ALL: [MeshGroupMarker; 1] = [MeshGroupMarker::SplitMeshGroup];

    pub fn header_name(self) -> &'static str {
        match self {
            MeshGroupMarker::SplitMeshGroup => "Split-Mesh-Groups",
        }
    }
}

/// Ordered, case-insensitive header map
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionHeaders {
    headers: Vec<(String, Vec<String>)>,
}

impl ExtensionHeaders {
    /// Parse the header text, or `None` if it is not an extension header.
    pub fn parse(text: &str) -> Option<Self> {
        let prefix = text.get(..EXTENSIONS_HEADER.len() + 1)?;
        if !prefix.eq_ignore_ascii_case(&format!("{EXTENSIONS_HEADER}:")) {
            return None;
        }

        let mut headers = Self::default();
        for line in text.split('\n') {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim();
            if key.is_empty() || key.contains(char::is_whitespace) || headers.get(key).is_some() {
                continue;
            }
            let values = value
                .split(',')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .collect();
            headers.headers.push((key.to_string(), values));
        }
        Some(headers)
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Append values to a header, creating it if needed.
    pub fn append(&mut self, key: &str, values: impl IntoIterator<Item = String>) {
        match self
            .headers
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
        {
            Some((_, existing)) => existing.extend(values),
            None => self.headers.push((key.to_string(), values.into_iter().collect())),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Vec<String>> {
        let position = self
            .headers
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(key))?;
        Some(self.headers.remove(position).1)
    }

    // ========================================================================
    // Extension list
    // ========================================================================

    pub fn extensions(&self) -> &[String] {
        self.get(EXTENSIONS_HEADER).unwrap_or(&[])
    }

    pub fn has_extension(&self, name: &str) -> bool {
        self.extensions().iter().any(|e| e.eq_ignore_ascii_case(name))
    }

    pub fn add_extension(&mut self, name: &str) {
        if !self.has_extension(name) {
            self.append(EXTENSIONS_HEADER, [name.to_string()]);
        }
    }

    pub fn remove_extension(&mut self, name: &str) {
        if let Some((_, values)) = self
            .headers
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(EXTENSIONS_HEADER))
        {
            values.retain(|e| !e.eq_ignore_ascii_case(name));
        }
        if self.get(EXTENSIONS_HEADER).is_some_and(<[String]>::is_empty) {
            self.remove(EXTENSIONS_HEADER);
        }
    }

    // ========================================================================
    // Positional markers
    // ========================================================================

    /// Remove a marker header and return the object indices it names that are
    /// below `count`. Anything else is logged and ignored.
    pub fn take_marker_indices(&mut self, header: &str, count: usize) -> Vec<usize> {
        let Some(values) = self.remove(header) else {
            return Vec::new();
        };
        values
            .iter()
            .filter_map(|value| match value.parse::<usize>() {
                Ok(index) if index < count => Some(index),
                _ => {
                    tracing::warn!(header, value = value.as_str(), "ignoring invalid object marker");
                    None
                }
            })
            .collect()
    }

    /// Render the header text, or `None` when there is nothing to write.
    ///
    /// The extension list always comes first.
    pub fn to_text(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        let mut text = format!("{EXTENSIONS_HEADER}: {}\n", self.extensions().join(", "));
        for (key, values) in self.iter() {
            if key.eq_ignore_ascii_case(EXTENSIONS_HEADER) {
                continue;
            }
            let _ = writeln!(text, "{key}: {}", values.join(", "));
        }
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_headers() {
        let text = "x-fmdl-EXTENSIONS: mesh-splitting ,antiblur\n\
                    Split-Mesh-Groups: 3, 4\r\n\
                    bad key: 1\n\
                    split-mesh-groups: 9\n\
                    no colon here\n";
        let headers = ExtensionHeaders::parse(text).unwrap();
        assert_eq!(headers.extensions(), ["mesh-splitting", "antiblur"]);
        assert_eq!(headers.get("SPLIT-MESH-GROUPS").unwrap(), ["3", "4"]);
        assert!(headers.get("bad key").is_none());
        assert_eq!(headers.iter().count(), 2);
    }

    #[test]
    fn test_parse_requires_prefix() {
        assert!(ExtensionHeaders::parse("").is_none());
        assert!(ExtensionHeaders::parse("Some-Other: x").is_none());
        assert!(ExtensionHeaders::parse("X-FMDL-Extensions").is_none());
        let empty = ExtensionHeaders::parse("X-FMDL-Extensions:").unwrap();
        assert!(empty.extensions().is_empty());
    }

    #[test]
    fn test_extension_list_editing() {
        let mut headers = ExtensionHeaders::default();
        headers.add_extension("mesh-splitting");
        headers.add_extension("Mesh-Splitting");
        headers.add_extension("antiblur");
        assert_eq!(headers.extensions(), ["mesh-splitting", "antiblur"]);
        headers.remove_extension("MESH-SPLITTING");
        headers.remove_extension("antiblur");
        assert!(headers.is_empty());
    }

    #[test]
    fn test_take_marker_indices() {
        let mut headers =
            ExtensionHeaders::parse("X-FMDL-Extensions: a\nSplit-Mesh-Groups: 1, x, 7, 0").unwrap();
        let indices = headers.take_marker_indices(MeshGroupMarker::SplitMeshGroup.header_name(), 5);
        assert_eq!(indices, [1, 0]);
        assert!(headers.get("split-mesh-groups").is_none());
    }

    #[test]
    fn test_to_text() {
        let mut headers = ExtensionHeaders::default();
        assert_eq!(headers.to_text(), None);
        headers.append("Split-Mesh-Groups", ["2".to_string()]);
        headers.add_extension("mesh-splitting");
        headers.append("split-mesh-groups", ["5".to_string()]);
        assert_eq!(
            headers.to_text().unwrap(),
            "X-FMDL-Extensions: mesh-splitting\nSplit-Mesh-Groups: 2, 5\n"
        );
        let reparsed = ExtensionHeaders::parse(&headers.to_text().unwrap()).unwrap();
        assert_eq!(reparsed.extensions(), ["mesh-splitting"]);
        assert_eq!(reparsed.get("split-mesh-groups").unwrap(), ["2", "5"]);
    }
}
