//! Exit codes following sysexits.h conventions.
//!
//! Scripts can tell an authentic image (0), an image without any payload (3)
//! and a tampered or malformed one (65) apart without parsing output.

use geocam_core::GeoCamError;

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// No payload was found in any carrier.
pub const NO_PAYLOAD: i32 = 3;

/// Command line usage error (invalid arguments).
/// Maps to EX_USAGE from sysexits.h.
pub const USAGE_ERROR: i32 = 64;

/// Data format error (signature mismatch, malformed payload).
/// Maps to EX_DATAERR from sysexits.h.
pub const VERIFICATION_FAILED: i32 = 65;

/// Cannot open or decode the input file.
/// Maps to EX_NOINPUT from sysexits.h.
pub const INPUT_ERROR: i32 = 66;

/// I/O error (cannot write output file or key store).
/// Maps to EX_IOERR from sysexits.h.
pub const IO_ERROR: i32 = 74;

/// Text appended to `--help`.
pub const HELP_TEXT: &str = "\
Exit codes:
  0   success / authentic
  1   general error
  3   no payload found
  64  usage error
  65  verification failed (tampered or malformed)
  66  cannot read input
  74  cannot write output";

/// Represents an exit code with optional error context.
pub struct ExitCode {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitCode {
    pub const fn success() -> Self {
        Self {
            code: SUCCESS,
            message: None,
        }
    }

    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");

        let code = match err.downcast_ref::<GeoCamError>() {
            Some(GeoCamError::PayloadNotFound) => NO_PAYLOAD,
            Some(
                GeoCamError::MalformedPayload(_)
                | GeoCamError::InvalidSignatureEncoding(_)
                | GeoCamError::InvalidPublicKey(_),
            ) => VERIFICATION_FAILED,
            Some(GeoCamError::ImageLoadFailure(_)) => INPUT_ERROR,
            // a key store error is an input error when it happened while loading
            Some(GeoCamError::KeyStore(_) | GeoCamError::Io(_))
                if message.starts_with("Failed to read") =>
            {
                INPUT_ERROR
            }
            Some(GeoCamError::ImageEncodeFailure(_) | GeoCamError::KeyStore(_)) => IO_ERROR,
            _ => classify_message(&message),
        };

        Self {
            code,
            message: Some(message),
        }
    }
}

// Fallback for errors that only carry context strings.
fn classify_message(message: &str) -> i32 {
    if message.contains("No payload found") {
        NO_PAYLOAD
    } else if message.contains("Failed to read") {
        INPUT_ERROR
    } else if message.contains("Verification failed") {
        VERIFICATION_FAILED
    } else if message.contains("Failed to write") {
        IO_ERROR
    } else {
        GENERAL_ERROR
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_core_errors_are_classified() {
        let err = anyhow::Error::new(GeoCamError::PayloadNotFound);
        assert_eq!(ExitCode::from_anyhow(&err).code, NO_PAYLOAD);

        let err = anyhow::Error::new(GeoCamError::MalformedPayload("bad".into()));
        assert_eq!(ExitCode::from_anyhow(&err).code, VERIFICATION_FAILED);

        let err = anyhow::Error::new(GeoCamError::ImageLoadFailure("bad".into()));
        assert_eq!(ExitCode::from_anyhow(&err).code, INPUT_ERROR);
    }

    #[test]
    fn test_context_messages_are_classified() {
        let err: anyhow::Result<()> =
            Err(std::io::Error::other("denied")).context("Failed to read image: a.png");
        assert_eq!(ExitCode::from_anyhow(&err.unwrap_err()).code, INPUT_ERROR);

        let err = anyhow::anyhow!("Failed to write sealed image");
        assert_eq!(ExitCode::from_anyhow(&err).code, IO_ERROR);

        let err: anyhow::Result<()> = Err(GeoCamError::KeyStore("corrupt key file".into()))
            .context("Failed to read key store: device.keystore");
        assert_eq!(ExitCode::from_anyhow(&err.unwrap_err()).code, INPUT_ERROR);

        let err: anyhow::Result<()> = Err(GeoCamError::KeyStore("denied".into()))
            .context("Failed to write key store: device.keystore");
        assert_eq!(ExitCode::from_anyhow(&err.unwrap_err()).code, IO_ERROR);

        let err = anyhow::anyhow!("something else");
        assert_eq!(ExitCode::from_anyhow(&err).code, GENERAL_ERROR);
    }
}
