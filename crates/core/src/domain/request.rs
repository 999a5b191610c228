use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisKind {
    #[default]
    Ticker,
    Chart,
    Question,
}

impl AnalysisKind {
    pub const ALL: [AnalysisKind; 3] = [
        AnalysisKind::Ticker,
        AnalysisKind::Chart,
        AnalysisKind::Question,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AnalysisKind::Ticker => "ticker",
            AnalysisKind::Chart => "chart",
            AnalysisKind::Question => "question",
        }
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "ticker" => Ok(AnalysisKind::Ticker),
            "chart" => Ok(AnalysisKind::Chart),
            "question" => Ok(AnalysisKind::Question),
            other => anyhow::bail!("unknown analysis type: {other:?}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    #[default]
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Timeframe {
    pub const ALL: [Timeframe; 4] = [
        Timeframe::Daily,
        Timeframe::Weekly,
        Timeframe::Monthly,
        Timeframe::Yearly,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Timeframe::Daily => "daily",
            Timeframe::Weekly => "weekly",
            Timeframe::Monthly => "monthly",
            Timeframe::Yearly => "yearly",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Timeframe::Daily => "Daily",
            Timeframe::Weekly => "Weekly",
            Timeframe::Monthly => "Monthly",
            Timeframe::Yearly => "Yearly",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Timeframe::Daily),
            "weekly" => Ok(Timeframe::Weekly),
            "monthly" => Ok(Timeframe::Monthly),
            "yearly" => Ok(Timeframe::Yearly),
            other => anyhow::bail!("unknown timeframe: {other:?}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl ImageFormat {
    /// Accepts `.png`, `.jpg` and `.jpeg`, ignoring case.
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let ext = Path::new(file_name).extension()?.to_str()?;
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(ImageFormat::Png),
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            _ => None,
        }
    }

    pub fn media_type(self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    TooManyFiles(usize),
    UnsupportedFormat(String),
    Empty(String),
}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadError::TooManyFiles(n) => {
                write!(f, "Only one chart image can be uploaded (got {n})")
            }
            UploadError::UnsupportedFormat(name) => write!(
                f,
                "Unsupported file {name:?}. Supported formats: PNG, JPG, JPEG"
            ),
            UploadError::Empty(name) => write!(f, "File {name:?} is empty"),
        }
    }
}

impl std::error::Error for UploadError {}

/// An uploaded chart. Only the metadata is serialized.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct ChartImage {
    pub file_name: String,
    #[serde(rename = "media_type", serialize_with = "serialize_media_type")]
    pub format: ImageFormat,
    #[serde(rename = "size_bytes", serialize_with = "serialize_len")]
    pub bytes: Vec<u8>,
}

impl ChartImage {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, UploadError> {
        let file_name = file_name.into();
        let Some(format) = ImageFormat::from_file_name(&file_name) else {
            return Err(UploadError::UnsupportedFormat(file_name));
        };
        if bytes.is_empty() {
            return Err(UploadError::Empty(file_name));
        }
        Ok(Self {
            file_name,
            format,
            bytes,
        })
    }
}

impl fmt::Debug for ChartImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChartImage")
            .field("file_name", &self.file_name)
            .field("format", &self.format)
            .field("size_bytes", &self.bytes.len())
            .finish()
    }
}

fn serialize_media_type<S: serde::Serializer>(
    format: &ImageFormat,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(format.media_type())
}

#[allow(clippy::ptr_arg)]
fn serialize_len<S: serde::Serializer>(bytes: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(bytes.len() as u64)
}

/// A validated analysis request. Each variant carries only the inputs its
/// mode needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AnalysisRequest {
    Ticker { ticker: String, timeframe: Timeframe },
    Chart { chart_image: ChartImage },
    Question { question: String },
}

impl AnalysisRequest {
    pub fn kind(&self) -> AnalysisKind {
        match self {
            AnalysisRequest::Ticker { .. } => AnalysisKind::Ticker,
            AnalysisRequest::Chart { .. } => AnalysisKind::Chart,
            AnalysisRequest::Question { .. } => AnalysisKind::Question,
        }
    }

    pub fn ticker(&self) -> Option<&str> {
        match self {
            AnalysisRequest::Ticker { ticker, .. } => Some(ticker),
            _ => None,
        }
    }

    pub fn timeframe(&self) -> Option<Timeframe> {
        match self {
            AnalysisRequest::Ticker { timeframe, .. } => Some(*timeframe),
            _ => None,
        }
    }

    /// Short human title, as used in the history table.
    pub fn title(&self) -> String {
        match self {
            AnalysisRequest::Ticker { ticker, .. } => format!("{ticker} Analysis"),
            AnalysisRequest::Chart { chart_image } => {
                format!("{} Chart Analysis", chart_image.file_name)
            }
            AnalysisRequest::Question { question } => question.clone(),
        }
    }
}
