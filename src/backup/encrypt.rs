use crate::backup::command::{escape_arg, CommandInvocation};
use crate::backup::file_ext::FileExtProvider;
use std::path::Path;

static AGE_BIN: &str = "age";

/// Asymmetric age encryption to a single recipient through the `age` binary.
///
/// No passphrase is involved; only the holder of the matching identity can
/// decrypt. The recipient is masked in command logs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgeEncryptor {
    recipient: String,
}

impl AgeEncryptor {
    pub fn new<S: Into<String>>(recipient: S) -> Self {
        Self {
            recipient: recipient.into(),
        }
    }

    pub fn command(&self, input: &Path, output: &Path) -> CommandInvocation {
        let recipient = escape_arg(&self.recipient);
        CommandInvocation::new(AGE_BIN)
            .arg("--encrypt")
            .arg(format!("-r {recipient}"))
            .arg(format!("-o {}", escape_arg(output.to_string_lossy())))
            .arg(escape_arg(input.to_string_lossy()))
            .escaped_secret(&self.recipient)
    }
}

impl FileExtProvider for AgeEncryptor {
    fn file_ext(&self) -> &'static str {
        "age"
    }
}
