//! Formatting utilities for Telegram MarkdownV2.

use crate::{
    classifier::RiskReport,
    domain::Profile,
    remote::{RemoteStatus, MAX_LOGIN_ATTEMPTS},
};

/// Characters Telegram reserves in MarkdownV2 text.
const MARKDOWN_V2_RESERVED: &[char] = &[
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
];

/// Escape untrusted text for MarkdownV2 parse mode.
pub fn escape_markdown_v2(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 4);
    for ch in text.chars() {
        if ch == '\\' || MARKDOWN_V2_RESERVED.contains(&ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Escape a URL used inside `[label](...)`: only `)` and `\` are special there.
pub fn escape_markdown_v2_url(url: &str) -> String {
    url.replace('\\', "\\\\").replace(')', "\\)")
}

fn yes_no(v: bool) -> &'static str {
    if v {
        "Yes"
    } else {
        "No"
    }
}

/// Full `/analyze` result in MarkdownV2.
pub fn render_profile_report(profile: &Profile, report: &RiskReport) -> String {
    let esc = escape_markdown_v2;
    let or_none = |s: &str| {
        if s.trim().is_empty() {
            "None".to_string()
        } else {
            esc(s)
        }
    };

    let mut lines = vec![
        format!("*Public information for {}*", esc(&profile.username)),
        String::new(),
        format!("Username: {}", esc(&profile.username)),
        format!("Full Name: {}", or_none(&profile.full_name)),
        format!("Biography: {}", or_none(&profile.biography)),
        format!("Followers: {}", profile.follower_count),
        format!("Following: {}", profile.following_count),
        format!("Private Account: {}", yes_no(profile.is_private)),
        format!("Posts: {}", profile.post_count),
        format!(
            "External URL: {}",
            or_none(profile.external_url.as_deref().unwrap_or(""))
        ),
        String::new(),
        "*Suggested Reports:*".to_string(),
    ];

    for (category, intensity) in report.entries() {
        lines.push(format!("• {intensity}x \\- {}", category.label()));
    }

    lines.push(String::new());
    lines.push(format!(
        "[View Profile]({})",
        escape_markdown_v2_url(&profile.profile_url)
    ));
    lines.push(String::new());
    lines.push(
        "_Note: this is a keyword heuristic based on public data, not a verified moderation signal\\._"
            .to_string(),
    );

    lines.join("\n")
}

/// `/instastatus` body (plain text).
pub fn render_remote_status(status: &RemoteStatus) -> String {
    [
        "Instagram session status".to_string(),
        format!("Auth state: {}", status.auth_state.as_str()),
        format!(
            "Login attempts: {}/{}",
            status.login_attempts, MAX_LOGIN_ATTEMPTS
        ),
        format!("Anonymous mode: {}", yes_no(status.anonymous)),
        format!(
            "Last error: {}",
            status.last_error.as_deref().unwrap_or("none")
        ),
    ]
    .join("\n")
}
