//! Digest email rendering.
//!
//! Produces both an HTML body (video cards with markdown summaries
//! converted via pulldown-cmark) and a plain-text fallback.

use chrono::{DateTime, Utc};
use pulldown_cmark::{html, Options, Parser};
use vidigest_models::SummaryRecord;

use crate::digest::DIGEST_WINDOW_DAYS;

/// A fully rendered digest email, ready to hand to a [`crate::Mailer`].
#[derive(Debug, Clone)]
pub struct RenderedDigest {
    pub subject: String,
    pub html: String,
    pub text: String,
}

const EMAIL_STYLE: &str = r#"
        body { margin: 0; padding: 0; background-color: #f4f4f7; font-family: -apple-system, 'Segoe UI', Roboto, Helvetica, Arial, sans-serif; color: #2d2d2d; }
        .container { max-width: 640px; margin: 0 auto; background-color: #ffffff; }
        .header { background-color: #1a1a2e; color: #ffffff; padding: 40px 30px; text-align: center; }
        .header h1 { margin: 0 0 6px 0; font-size: 30px; }
        .subtitle { margin: 0; color: #b8b8d1; font-size: 15px; }
        .date-range { display: inline-block; margin-top: 12px; padding: 4px 12px; background-color: #2e2e4e; border-radius: 12px; font-size: 13px; color: #d8d8ee; }
        .content { padding: 30px; }
        .stats-badge { display: inline-block; padding: 6px 14px; background-color: #eef1ff; border-radius: 14px; font-size: 14px; color: #3a3a6e; }
        .intro { color: #555; font-size: 15px; }
        .video-card { border: 1px solid #e4e4ec; border-radius: 8px; padding: 22px; margin-bottom: 20px; }
        .video-title { margin: 0 0 6px 0; font-size: 20px; }
        .video-title a { color: #1a1a2e; text-decoration: none; }
        .video-meta { margin: 0 0 14px 0; font-size: 13px; color: #777; }
        .channel-name { font-weight: 600; color: #444; }
        .video-summary { font-size: 15px; line-height: 1.6; }
        .watch-link { display: inline-block; margin-top: 10px; font-size: 14px; color: #4a4ae6; text-decoration: none; }
        .no-content { text-align: center; padding: 40px 20px; color: #666; }
        .no-content-icon { font-size: 44px; margin-bottom: 12px; }
        .footer { padding: 24px 30px; text-align: center; font-size: 12px; color: #999; border-top: 1px solid #eee; }
        .footer a { color: #777; }
"#;

/// Render the weekly digest for the given summaries.
///
/// An empty slice still yields a complete email; the pipeline sends the
/// digest every week so subscribers can tell the system is alive.
pub fn render_digest(summaries: &[SummaryRecord], now: DateTime<Utc>) -> RenderedDigest {
    let week_ago = now - chrono::Duration::days(DIGEST_WINDOW_DAYS);
    let date_range = format!(
        "{} - {}",
        week_ago.format("%b %d"),
        now.format("%b %d, %Y")
    );

    let subject = if summaries.is_empty() {
        format!("📺 Vidigest Weekly Digest - {}", now.format("%b %d, %Y"))
    } else {
        let plural = if summaries.len() > 1 { "ies" } else { "y" };
        format!(
            "📺 Vidigest: {} New Video Summar{} This Week",
            summaries.len(),
            plural
        )
    };

    let (html, text) = if summaries.is_empty() {
        (
            wrap_html(&date_range, NO_CONTENT_HTML),
            format!("Vidigest Weekly Digest ({date_range})\n\nNo new videos this week."),
        )
    } else {
        let mut cards = Vec::with_capacity(summaries.len() + 1);
        cards.push(format!(
            "<span class=\"stats-badge\">📊 {} video(s) summarized</span>\n\
             <p class=\"intro\">Here's what you missed from your favorite YouTube channels this week.</p>",
            summaries.len()
        ));

        let mut plain = vec![
            format!("Vidigest Weekly Digest ({date_range})\n"),
            format!("{} video(s) summarized this week:\n", summaries.len()),
        ];

        for (i, summary) in summaries.iter().enumerate() {
            cards.push(render_card(summary));
            plain.push(format!("\n{}. {}", i + 1, summary.title));
            plain.push(format!("   Channel: {}", summary.channel_title));
            plain.push(format!(
                "   Link: https://youtube.com/watch?v={}",
                summary.video_id
            ));
            plain.push(format!("\n{}\n", summary.summary));
        }

        (wrap_html(&date_range, &cards.join("\n")), plain.join("\n"))
    };

    RenderedDigest {
        subject,
        html,
        text,
    }
}

const NO_CONTENT_HTML: &str = r#"<div class="no-content">
    <div class="no-content-icon">📭</div>
    <h2>No New Videos This Week</h2>
    <p>None of your subscribed channels published new content with available transcripts.</p>
</div>"#;

fn render_card(summary: &SummaryRecord) -> String {
    format!(
        r#"<div class="video-card">
    <h2 class="video-title">
        <a href="https://youtube.com/watch?v={id}">{title}</a>
    </h2>
    <p class="video-meta">
        <span class="channel-name">{channel}</span> · {published}
    </p>
    <div class="video-summary">
        {body}
    </div>
    <a href="https://youtube.com/watch?v={id}" class="watch-link">Watch Video →</a>
</div>"#,
        id = summary.video_id,
        title = escape_html(&summary.title),
        channel = escape_html(&summary.channel_title),
        published = summary.published_at.format("%b %d, %Y"),
        body = markdown_to_html(&summary.summary),
    )
}

fn wrap_html(date_range: &str, content: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <style>{style}</style>
</head>
<body>
    <div class="container">
        <div class="header">
            <h1>📺 Vidigest</h1>
            <p class="subtitle">Your Weekly Video Digest</p>
            <span class="date-range">{date_range}</span>
        </div>
        <div class="content">
            {content}
        </div>
        <div class="footer">
            <p>Powered by Vidigest</p>
            <p>You received this because you subscribed to video summaries.</p>
        </div>
    </div>
</body>
</html>"#,
        style = EMAIL_STYLE,
    )
}

/// Convert an LLM-produced markdown summary into an HTML fragment.
fn markdown_to_html(markdown: &str) -> String {
    let parser = Parser::new_ext(markdown, Options::empty());
    let mut out = String::with_capacity(markdown.len() * 2);
    html::push_html(&mut out, parser);
    out
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use vidigest_models::VideoId;

    fn sample(id: &str, title: &str, summary: &str) -> SummaryRecord {
        SummaryRecord::new(
            VideoId::from(id),
            title,
            "chan-1",
            "Test Channel",
            Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap(),
            summary,
        )
    }

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 9, 0, 0).unwrap()
    }

    #[test]
    fn singular_subject_for_one_summary() {
        let digest = render_digest(&[sample("a1", "First Video", "A summary.")], now());
        assert_eq!(
            digest.subject,
            "📺 Vidigest: 1 New Video Summary This Week"
        );
    }

    #[test]
    fn plural_subject_for_many() {
        let summaries = vec![
            sample("a1", "First", "one"),
            sample("b2", "Second", "two"),
        ];
        let digest = render_digest(&summaries, now());
        assert_eq!(
            digest.subject,
            "📺 Vidigest: 2 New Video Summaries This Week"
        );
    }

    #[test]
    fn empty_digest_has_no_content_body() {
        let digest = render_digest(&[], now());
        assert_eq!(digest.subject, "📺 Vidigest Weekly Digest - Mar 15, 2024");
        assert!(digest.html.contains("No New Videos This Week"));
        assert!(digest.text.contains("No new videos this week."));
        assert!(digest.text.contains("Mar 08 - Mar 15, 2024"));
    }

    #[test]
    fn card_links_to_the_video() {
        let digest = render_digest(&[sample("abc123", "My Video", "text")], now());
        assert!(digest
            .html
            .contains("https://youtube.com/watch?v=abc123"));
        assert!(digest
            .text
            .contains("Link: https://youtube.com/watch?v=abc123"));
    }

    #[test]
    fn markdown_summary_becomes_html() {
        let digest = render_digest(
            &[sample("a1", "Video", "**Key point** about the talk")],
            now(),
        );
        assert!(digest.html.contains("<strong>Key point</strong>"));
        // Plain text keeps the raw markdown.
        assert!(digest.text.contains("**Key point** about the talk"));
    }

    #[test]
    fn titles_are_escaped_in_html() {
        let digest = render_digest(
            &[sample("a1", "Rust <Generics> & Lifetimes", "body")],
            now(),
        );
        assert!(digest
            .html
            .contains("Rust &lt;Generics&gt; &amp; Lifetimes"));
    }
}
