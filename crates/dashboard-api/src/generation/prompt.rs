//! Prompt templates

/// System message for document answers
pub const ANSWER_SYSTEM_PROMPT: &str = "You are a helpful document assistant. Answer questions based only on the provided document context. Be concise and factual.";

/// Reply used when the model returns no choices
pub const NO_ANSWER: &str = "No answer generated.";

/// Instructions placed before a video transcript
pub const SUMMARY_PROMPT: &str = r#"You are an expert study notes creator. Given the following YouTube video transcript, create comprehensive, well-structured study notes in Markdown.

**Format your response EXACTLY like this:**

## 📝 Key Takeaways
- (5-7 concise bullet points of the most important ideas)

## 📖 Detailed Summary
(3-4 well-written paragraphs covering the main content)

## 📚 Important Terms & Concepts
| Term | Definition |
|------|-----------|
| (key term) | (brief definition) |

## 🔖 Notable Quotes / Moments
- (2-3 important quotes or timestamped moments)

## ❓ Study Questions
1. (Question to test understanding)
2. (Question to test understanding)
3. (Question to test understanding)

---

Here is the transcript:

"#;

/// User message for a document question
pub fn answer_prompt(context: &str, question: &str) -> String {
    format!(
        "Context from the document:\n---\n{}\n---\n\nQuestion: {}\n\nAnswer the question based ONLY on the provided context above. Be concise and accurate. If the answer cannot be found in the context, say \"I cannot find this information in the document.\"",
        context, question
    )
}

/// Full summarization prompt for a transcript
pub fn summary_prompt(transcript: &str) -> String {
    format!("{}{}", SUMMARY_PROMPT, transcript)
}
