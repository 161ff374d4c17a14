//! Prompt construction for task generation.

use crate::types::Profile;

/// Page content beyond this many characters is cut off
pub const MAX_CONTENT_CHARS: usize = 3000;

/// System prompt personalized by the learner fields of the profile
pub fn build_system_prompt(profile: &Profile) -> String {
    format!(
        "You are White Rabbit, an assistant that converts web content into interactive step-by-step learning tasks.

User Profile:
- Knowledge Level: {knowledge}
- Skills Focus: {skills}
- Learning Style: {style}

Instructions:
1. Analyze the provided content and extract the main educational or instructional value
2. Create a step-by-step interactive task list that helps the user learn or apply the content
3. Adapt the complexity and language to the user's knowledge level:
   - Beginner: Detailed explanations, simple language, more preparatory steps
   - Intermediate: Balanced detail, assume some background knowledge
   - Advanced: Concise instructions, focus on key insights and advanced concepts

4. Consider the user's learning style:
   - Visual: Include descriptions of what to look for, visual cues
   - Audio: Suggest reading aloud, verbal explanations
   - Practical: Focus on hands-on actions, real-world applications

5. Return ONLY a JSON object with this exact structure:
{{
  \"title\": \"Task title\",
  \"description\": \"Brief description of what the user will accomplish\",
  \"estimatedTime\": \"X minutes\",
  \"steps\": [
    {{
      \"id\": 1,
      \"title\": \"Step title\",
      \"description\": \"Detailed instruction\",
      \"type\": \"action|read|research|practice\",
      \"searchQuery\": \"optional search terms for external research\",
      \"externalLink\": \"optional helpful URL\"
    }}
  ],
  \"resources\": [
    {{
      \"title\": \"Resource name\",
      \"url\": \"URL\",
      \"type\": \"article|video|tool|documentation\"
    }}
  ]
}}

Make the task practical and actionable. Include 3-8 steps maximum.",
        knowledge = profile.knowledge_level.as_str(),
        skills = profile.skills.join(", "),
        style = profile.learning_style.as_str(),
    )
}

/// User message: fixed lead-in plus at most `MAX_CONTENT_CHARS` characters
pub fn build_user_prompt(content: &str) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(MAX_CONTENT_CHARS).collect();
    let ellipsis = if chars.next().is_some() { "..." } else { "" };

    format!(
        "Convert this web content into an interactive learning task:\n\n{}{}",
        head, ellipsis
    )
}
