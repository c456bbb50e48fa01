/// The request itself is unacceptable (bad path, bad encoding, invalid JSON for
/// a store file). The HTTP layer maps it to 400 instead of 500.
#[derive(Debug)]
pub struct RejectedContent(pub String);

impl std::fmt::Display for RejectedContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for RejectedContent {}
