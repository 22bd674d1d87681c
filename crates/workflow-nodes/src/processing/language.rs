//! Response language selection shared by the chat and vision nodes

/// Language the model is asked to answer in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Language {
    #[default]
    Chinese,
    English,
}

impl Language {
    /// Widget options, in display order
    pub const OPTIONS: [&'static str; 2] = ["中文", "English"];

    /// Parse a widget value; anything but `中文` selects English
    pub fn from_label(label: &str) -> Self {
        if label == "中文" {
            Language::Chinese
        } else {
            Language::English
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Language::Chinese => "中文",
            Language::English => "English",
        }
    }

    /// System message for chat conversations
    pub fn chat_instruction(&self) -> &'static str {
        match self {
            Language::Chinese => "请使用中文进行对话。",
            Language::English => "Please use English for conversation.",
        }
    }

    /// System prompt for image analysis
    pub fn vision_instruction(&self) -> String {
        format!("You are a vision assistant. Please answer in {}.", self.label())
    }
}
