use serde::{Deserialize, Serialize};
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::sqlite::{SqliteArgumentValue, SqliteTypeInfo, SqliteValueRef};
use sqlx::{Decode, Encode, Sqlite, Type};

/// File type mask of `st_mode`.
pub const S_IFMT: u32 = 0o170_000;
/// Directory type bits.
pub const S_IFDIR: u32 = 0o040_000;
/// Regular file type bits.
pub const S_IFREG: u32 = 0o100_000;
/// Symbolic link type bits.
pub const S_IFLNK: u32 = 0o120_000;

/// What a record stands for.
///
/// `target_id` is only populated for [`FileKind::Symlink`] and
/// [`FileKind::Hardlink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Regular,
    Directory,
    Symlink,
    Hardlink,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Regular => "regular",
            FileKind::Directory => "directory",
            FileKind::Symlink => "symlink",
            FileKind::Hardlink => "hardlink",
        }
    }

    /// The `st_mode` type bits reported for this kind.
    ///
    /// Hard links present as regular files.
    pub fn type_bits(&self) -> u32 {
        match self {
            FileKind::Regular | FileKind::Hardlink => S_IFREG,
            FileKind::Directory => S_IFDIR,
            FileKind::Symlink => S_IFLNK,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, FileKind::Directory)
    }
}

/// Error returned when a stored kind string is not recognized.
#[derive(Debug, thiserror::Error)]
#[error("unknown file kind: {0}")]
pub struct UnknownFileKind(String);

impl std::str::FromStr for FileKind {
    type Err = UnknownFileKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "regular" => Ok(FileKind::Regular),
            "directory" => Ok(FileKind::Directory),
            "symlink" => Ok(FileKind::Symlink),
            "hardlink" => Ok(FileKind::Hardlink),
            other => Err(UnknownFileKind(other.to_string())),
        }
    }
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Decode<'_, Sqlite> for FileKind {
    fn decode(value: SqliteValueRef<'_>) -> Result<Self, BoxDynError> {
        let s = <String as Decode<Sqlite>>::decode(value)?;
        Ok(s.parse()?)
    }
}

impl Encode<'_, Sqlite> for FileKind {
    fn encode_by_ref(
        &self,
        args: &mut Vec<SqliteArgumentValue<'_>>,
    ) -> Result<IsNull, BoxDynError> {
        args.push(SqliteArgumentValue::Text(self.as_str().into()));
        Ok(IsNull::No)
    }
}

impl Type<Sqlite> for FileKind {
    fn compatible(ty: &SqliteTypeInfo) -> bool {
        <String as Type<Sqlite>>::compatible(ty)
    }

    fn type_info() -> SqliteTypeInfo {
        <String as Type<Sqlite>>::type_info()
    }
}
