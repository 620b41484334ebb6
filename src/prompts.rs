//! Prompt templates for the four completion tasks.
//!
//! Every function here is pure: the same inputs always render the same prompt.
//! Validating that the content is non-empty is the caller's job.

use serde::{Deserialize, Serialize};

/// The completion tasks EconoBot sends to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    Summary,
    Metadata,
    Translation,
    Question,
}

impl Task {
    pub fn temperature(self) -> f32 {
        match self {
            Task::Summary | Task::Translation => 0.5,
            Task::Metadata => 0.2,
            Task::Question => 0.3,
        }
    }

    pub fn max_tokens(self) -> u32 {
        match self {
            Task::Summary | Task::Translation => 500,
            Task::Metadata => 200,
            Task::Question => 300,
        }
    }
}

/// Target languages offered for summary translation. `None` means no translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    None,
    Korean,
    Chinese,
    Spanish,
    French,
}

impl Language {
    pub const ALL: [Language; 5] = [
        Language::None,
        Language::Korean,
        Language::Chinese,
        Language::Spanish,
        Language::French,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Language::None => "None",
            Language::Korean => "Korean",
            Language::Chinese => "Chinese",
            Language::Spanish => "Spanish",
            Language::French => "French",
        }
    }
}

pub fn summary_prompt(content: &str) -> String {
    let mut result = String::with_capacity(content.len() + 600);
    result.push_str(
        "You are an economic analyst. Do the following based on the article:\n\n\
         1. Write a short paragraph summarizing the article's main economic themes.\n\
         2. List 3-5 key takeaways in bullet point format.\n\
         3. At the end, provide:\n\
         \x20   a) The overall economic sentiment (Positive, Neutral, or Negative), labeled as 'Sentiment:'\n\
         \x20   b) An impact score from 1 (low significance) to 10 (high significance), labeled as 'Impact Score:'\n\n\
         Article:\n",
    );
    result.push_str(content);
    result
}

pub fn metadata_prompt(content: &str) -> String {
    let mut result = String::with_capacity(content.len() + 600);
    result.push_str(
        "You are an economic analyst. From the article below, extract:\n\
         - up to 2 main economic topics (short phrases)\n\
         - the overall economic sentiment: Positive, Neutral, or Negative\n\
         - an impact score from 1 (low significance) to 10 (high significance), as an integer\n\n\
         Respond strictly with a JSON object and nothing else, in this exact shape:\n\
         {\"topics\": [\"topic one\", \"topic two\"], \"sentiment\": \"Neutral\", \"impact_score\": 5}\n\n\
         Article:\n",
    );
    result.push_str(content);
    result
}

pub fn translation_prompt(summary: &str, language: Language) -> String {
    format!("Translate this into {}:\n\n{}", language.name(), summary)
}

pub fn question_prompt(content: &str, question: &str) -> String {
    format!(
        "Based on the following article, answer the user's question accurately and concisely. \
         Use only information contained in the article.\n\n\
         Article:\n{}\n\nQuestion:\n{}",
        content, question
    )
}
