//! Instruction templates wrapped around the user prompt by each node.

use switchyard_core::types::{SearchHit, Strategy};

/// Classifier instruction listing every strategy tag.
pub fn classification(prompt: &str) -> String {
    let tags: Vec<String> = Strategy::ALL
        .iter()
        .map(|s| format!("'{}'", s.as_str()))
        .collect();
    format!(
        "Analyze the following prompt and decide whether it is a general query or one that \
         would be better served by a coding agent, a summarizing agent, or a content \
         generating agent (for example, writing a blog post). Choose exactly one of: [{}]. \
         Explain your choice briefly in choice_summary.\n\n{}",
        tags.join(", "),
        prompt
    )
}

/// Instruction for a direct-response strategy. `general` sends the prompt untouched.
pub fn respond(strategy: Strategy, prompt: &str) -> String {
    match strategy {
        Strategy::Code => format!(
            "You are a coding assistant answering the request below. Write in the language \
             the user asks for, and use Python when none is given. Output only code, with no \
             prose or reasoning around it. Be precise and avoid introducing bugs.\n\n{}",
            prompt
        ),
        Strategy::Summarize => format!(
            "You are a summarizing assistant. Summarize the user's content so it is concise, \
             readable and clear.\n\n{}",
            prompt
        ),
        Strategy::General | Strategy::Content => prompt.to_string(),
    }
}

/// Instruction asking for a bare web search query.
pub fn search_query(prompt: &str) -> String {
    format!(
        "Read the following prompt and reply, STRICTLY concisely, with a single high-quality \
         web search query that should surface the most relevant and helpful pages for it. \
         Your reply is passed directly to the search engine, so output the query text only.\n\n{}",
        prompt
    )
}

/// Numbered, citable source blocks. Empty when there are no results.
pub fn format_sources(results: &[SearchHit]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, hit)| {
            let snippet = if hit.snippet.is_empty() {
                "No snippet available."
            } else {
                hit.snippet.as_str()
            };
            let link = if hit.link.is_empty() {
                "No link available."
            } else {
                hit.link.as_str()
            };
            format!("[Source {}]: {}\nLink: {}", i + 1, snippet, link)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Content-generation instruction with the user request and formatted sources.
pub fn content(prompt: &str, sources: &str) -> String {
    format!(
        "You are a content generation agent. Write a high-quality, comprehensive response to \
         the user's request. Use the information in the SEARCH RESULTS section when it is \
         relevant, and cite it with clear markers such as [Source 1] or [Source 2].\n\n\
         ---- USER REQUEST ----\n{}\n---- SEARCH RESULTS ----\n{}\n",
        prompt, sources
    )
}
