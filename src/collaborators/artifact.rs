use std::fmt;

use serde::{Deserialize, Serialize};

/// Spectral index products the analytics collaborator can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IndexKind {
    Ndvi,
    Evi,
    Savi,
    Ndwi,
    Nbr,
}

impl IndexKind {
    pub const ALL: [IndexKind; 5] = [Self::Ndvi, Self::Evi, Self::Savi, Self::Ndwi, Self::Nbr];

    pub fn is_vegetation(&self) -> bool {
        matches!(self, Self::Ndvi | Self::Evi | Self::Savi)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ndvi => "NDVI",
            Self::Evi => "EVI",
            Self::Savi => "SAVI",
            Self::Ndwi => "NDWI",
            Self::Nbr => "NBR",
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "index")]
pub enum ArtifactKind {
    Raw,
    Index(IndexKind),
    Delta,
    Context,
    Report,
    Other,
}

impl ArtifactKind {
    /// Infer the kind from a file name such as `20240612_T33UUE_NDVI.tif`.
    pub fn infer(uri: &str) -> Self {
        let name = uri
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(uri)
            .to_ascii_uppercase();
        let tokens: Vec<&str> = name
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|t| !t.is_empty())
            .collect();

        if tokens.iter().any(|t| *t == "CHANGE" || *t == "DELTA") {
            return Self::Delta;
        }
        for index in IndexKind::ALL {
            if tokens.contains(&index.as_str()) {
                return Self::Index(index);
            }
        }
        if name.ends_with(".PDF") || name.ends_with(".HTML") || tokens.contains(&"REPORT") {
            return Self::Report;
        }
        if tokens
            .iter()
            .any(|t| matches!(*t, "WEATHER" | "CLIMATE" | "ERA5" | "GFS"))
        {
            return Self::Context;
        }
        if tokens.iter().any(|t| matches!(*t, "RAW" | "S1" | "S2" | "L8" | "L9"))
            || name.ends_with(".SAFE")
        {
            return Self::Raw;
        }
        Self::Other
    }

    pub fn index(&self) -> Option<IndexKind> {
        match self {
            Self::Index(kind) => Some(*kind),
            _ => None,
        }
    }

    pub fn is_vegetation_index(&self) -> bool {
        self.index().is_some_and(|k| k.is_vegetation())
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raw => f.write_str("raw"),
            Self::Index(kind) => write!(f, "index:{}", kind),
            Self::Delta => f.write_str("delta"),
            Self::Context => f.write_str("context"),
            Self::Report => f.write_str("report"),
            Self::Other => f.write_str("other"),
        }
    }
}

/// Opaque reference to a data product (file path, object key, or handle).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub uri: String,
    pub kind: ArtifactKind,
}

impl ArtifactRef {
    pub fn new(uri: impl Into<String>, kind: ArtifactKind) -> Self {
        Self {
            uri: uri.into(),
            kind,
        }
    }

    /// Build a reference from an untyped uri, inferring its kind.
    pub fn from_uri(uri: impl Into<String>) -> Self {
        let uri = uri.into();
        let kind = ArtifactKind::infer(&uri);
        Self { uri, kind }
    }

    pub fn raw(uri: impl Into<String>) -> Self {
        Self::new(uri, ArtifactKind::Raw)
    }

    pub fn index(uri: impl Into<String>, kind: IndexKind) -> Self {
        Self::new(uri, ArtifactKind::Index(kind))
    }

    /// File name portion of the uri without extension.
    pub fn stem(&self) -> &str {
        let name = self.uri.rsplit(['/', '\\']).next().unwrap_or(&self.uri);
        name.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(name)
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.uri, self.kind)
    }
}
