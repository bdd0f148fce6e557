use std::str::FromStr;

use chakwrite_common::{ChakError, Message};

/// Keyboard shortcuts registered by the extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuickCommand {
    RewriteSelection,
    ProofreadSelection,
}

impl QuickCommand {
    pub fn name(self) -> &'static str {
        match self {
            QuickCommand::RewriteSelection => "rewrite_selection",
            QuickCommand::ProofreadSelection => "proofread_selection",
        }
    }

    pub fn operation(self) -> &'static str {
        match self {
            QuickCommand::RewriteSelection => "rewriter",
            QuickCommand::ProofreadSelection => "proofreader",
        }
    }

    /// The page-bound message that runs this shortcut on the selection.
    pub fn to_message(self) -> Message {
        Message::PerformQuickAction {
            operation_type: self.operation().to_string(),
        }
    }
}

impl FromStr for QuickCommand {
    type Err = ChakError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rewrite_selection" => Ok(QuickCommand::RewriteSelection),
            "proofread_selection" => Ok(QuickCommand::ProofreadSelection),
            other => Err(ChakError::UnknownOperation(other.to_string())),
        }
    }
}
