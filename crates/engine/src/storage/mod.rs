mod envelope;

pub use envelope::{
    checksum_hex, read_envelope, write_envelope, SaveEnvelope, StorageError,
    ENVELOPE_FORMAT_VERSION,
};
