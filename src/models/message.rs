/// One verification request as received on the transport: `hexId,hexHash`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IncomingMessage {
    pub hex_id: String,
    pub hex_hash: String,
}

impl IncomingMessage {
    /// Split a received line into its two fields
    ///
    /// Surrounding whitespace (including the line terminator) is ignored.
    /// Returns `None` unless the line holds exactly two non-empty fields.
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.trim().split(',');

        let hex_id = parts.next()?.trim();
        let hex_hash = parts.next()?.trim();

        if parts.next().is_some() || hex_id.is_empty() || hex_hash.is_empty() {
            return None;
        }

        Some(Self {
            hex_id: hex_id.to_string(),
            hex_hash: hex_hash.to_string(),
        })
    }
}
