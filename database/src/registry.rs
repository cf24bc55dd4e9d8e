use enum_primitive_derive::Primitive;

/// One-byte key prefixes of the stores sharing the DB. Values are persisted, never renumber them.
#[derive(Primitive, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DatabaseStorePrefixes {
    ContentNodes = 1,
    ContentNextId = 2,

    Sessions = 10,
    SessionCursor = 11,
}

impl DatabaseStorePrefixes {
    pub fn name(self) -> &'static str {
        match self {
            DatabaseStorePrefixes::ContentNodes => "content-nodes",
            DatabaseStorePrefixes::ContentNextId => "content-next-id",
            DatabaseStorePrefixes::Sessions => "sessions",
            DatabaseStorePrefixes::SessionCursor => "session-cursor",
        }
    }
}

impl From<DatabaseStorePrefixes> for Vec<u8> {
    fn from(value: DatabaseStorePrefixes) -> Self {
        vec![value as u8]
    }
}
