// storj:// 地址解析
use crate::utils::error::TransferError;

pub const STORJ_SCHEME: &str = "storj://";

/// File part of a `storj://bucket/name` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileTarget {
    /// No name given (or `.`): the caller picks the default.
    Unspecified,
    /// The `*` sentinel, every file in the bucket.
    All,
    Named(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorjUri {
    pub bucket: String,
    pub file: FileTarget,
}

impl StorjUri {
    pub fn parse(input: &str) -> Result<Self, TransferError> {
        let invalid = || TransferError::InvalidUri {
            uri: input.to_string(),
        };
        let rest = input.strip_prefix(STORJ_SCHEME).ok_or_else(invalid)?;

        // 空段忽略，结尾的 `/` 不影响结果
        let tokens: Vec<&str> = std::iter::once("storj:")
            .chain(rest.split('/').filter(|s| !s.is_empty()))
            .collect();

        match tokens.as_slice() {
            [_, bucket] => Ok(Self {
                bucket: bucket.to_string(),
                file: FileTarget::Unspecified,
            }),
            [_, bucket, name] => {
                let file = match *name {
                    "." => FileTarget::Unspecified,
                    "*" => FileTarget::All,
                    other => FileTarget::Named(other.to_string()),
                };
                Ok(Self {
                    bucket: bucket.to_string(),
                    file,
                })
            }
            _ => Err(invalid()),
        }
    }

    pub fn is_storj(input: &str) -> bool {
        input.starts_with(STORJ_SCHEME)
    }

}
