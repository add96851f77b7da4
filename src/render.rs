//! HTML rendering for the chat page.
//!
//! Templates are `minijinja` sources compiled once into a [`Renderer`].
//! Template names end in `.html`, so every interpolated value is
//! HTML-escaped unless it was built with [`Value::from_safe_string`]. The
//! two chat bubbles keep a single `{{ MSG }}` slot each.

use anyhow::Result;
use minijinja::{context, Environment, Value};
use serde::Serialize;

use crate::history::HistoryBucket;
use crate::models::QaPair;
use crate::references::{
    ReferenceEntry, References, ACCESS_RESTRICTED, NONE_FOUND, PARTIAL_LIMITATION,
};

const USER_AVATAR: &str = "https://i.ibb.co/McWFFH5/outlined-image.png";
const BOT_AVATAR: &str = "https://i.ibb.co/cN0nmSj/Screenshot-2023-05-28-at-02-37-21.png";

const CSS: &str = r#"
.chat-message { padding: 1.5rem; border-radius: 0.5rem; margin-bottom: 1rem; display: flex; }
.chat-message.user { background-color: #2b313e; }
.chat-message.bot { background-color: #475063; }
.chat-message .avatar { width: 20%; }
.chat-message .avatar img { max-width: 78px; max-height: 78px; border-radius: 50%; object-fit: cover; }
.chat-message .message { width: 80%; padding: 0 1.5rem; color: #fff; white-space: pre-wrap; }
.chat-message .message a { text-decoration: none; color: #8ab4ff; }
input::placeholder { color: black !important; opacity: 1 !important; }
body { font-family: sans-serif; margin: 0; display: flex; }
aside { width: 22rem; padding: 1rem; background: #f0f2f6; min-height: 100vh; }
main { flex: 1; padding: 1rem 2rem; }
.notice { padding: 0.75rem; border-radius: 0.4rem; margin-bottom: 1rem; }
.notice.success { background: #d4edda; }
.notice.warning { background: #fff3cd; }
.notice.error { background: #f8d7da; }
.history button { display: block; width: 100%; text-align: left; margin: 0.2rem 0; }
"#;

const USER_TEMPLATE: &str = r#"
<div class="chat-message user">
    <div class="avatar">
        <img src="{{ avatar }}">
    </div>
    <div class="message">{{ MSG }}</div>
</div>
"#;

const BOT_TEMPLATE: &str = r#"
<div class="chat-message bot">
    <div class="avatar">
        <img src="{{ avatar }}">
    </div>
    <div class="message">{{ MSG }}</div>
</div>
"#;

const BOT_MESSAGE_TEMPLATE: &str = r#"{{ answer }}

<strong>References:</strong>
{% if notice %}{{ notice }}{% else %}{% for entry in entries %}{% if entry.href %}<a href="{{ entry.href }}" target="_blank">{{ entry.label }}</a>{% else %}{{ entry.label }}{% endif %}
{% endfor %}{% endif %}"#;

const PAGE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>Chat with multiple PDFs</title>
<style>{{ css }}</style>
</head>
<body>
<aside>
  <h2>Converse AI<br><small>Chat with multiple PDFs</small></h2>
  <h3>Your documents</h3>
  <form action="/process" method="post" enctype="multipart/form-data">
    <input type="file" name="files" accept="application/pdf" multiple>
    <button type="submit">Process</button>
  </form>
  <h3>Remote document</h3>
  <form action="/process/remote" method="post">
    <input type="url" name="url" placeholder="https://example.com/report.pdf" required>
    <input type="text" name="username" placeholder="Username (optional)">
    <input type="password" name="password" placeholder="Password (optional)">
    <button type="submit">Fetch &amp; Process</button>
  </form>
  {% if documents %}
  <ul>
  {% for doc in documents %}<li><a href="/documents/{{ loop.index0 }}" target="_blank">{{ doc }}</a></li>{% endfor %}
  </ul>
  {% endif %}
  <div class="history">
  {% for bucket in sidebar %}
    <h4>{{ bucket.title }}</h4>
    {% for entry in bucket.entries %}
    <form action="/history/select" method="post">
      <input type="hidden" name="date" value="{{ bucket.date }}">
      <input type="hidden" name="index" value="{{ entry.index }}">
      <button type="submit">{{ entry.label }}</button>
    </form>
    {% endfor %}
  {% endfor %}
  </div>
  <form action="/session/reset" method="post"><button type="submit">Reset session</button></form>
</aside>
<main>
  <h1>Ask Anything About Your Uploaded PDFs</h1>
  {% if notice %}<div class="notice {{ notice.level }}">{{ notice.text }}</div>{% endif %}
  {% if selected %}
    {{ selected }}
    <form action="/history/clear" method="post"><button type="submit">Back to chat</button></form>
  {% else %}
    {% for bubble in bubbles %}{{ bubble }}{% endfor %}
    <form action="/ask" method="post">
      <input type="text" name="question" placeholder="Enter Your Query Prompt:" autofocus style="width: 100%">
    </form>
  {% endif %}
</main>
</body>
</html>
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            text: text.into(),
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            text: text.into(),
        }
    }
}

/// Everything the page needs, detached from the session lock.
#[derive(Debug, Clone, Default)]
pub struct PageView {
    pub notice: Option<Notice>,
    pub documents: Vec<String>,
    pub history: Vec<QaPair>,
    pub selected: Option<QaPair>,
    pub sidebar: Vec<HistoryBucket>,
}

#[derive(Serialize)]
struct EntryView {
    label: String,
    /// Built by us from base64 and a page number; inserted unescaped.
    href: Option<Value>,
}

pub struct Renderer {
    env: Environment<'static>,
}

impl Renderer {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.add_template("user.html", USER_TEMPLATE)?;
        env.add_template("bot.html", BOT_TEMPLATE)?;
        env.add_template("bot_message.html", BOT_MESSAGE_TEMPLATE)?;
        env.add_template("page.html", PAGE_TEMPLATE)?;
        Ok(Self { env })
    }

    /// The bot's side of a Q/A pair: escaped answer plus the references block.
    pub fn bot_message(&self, answer: &str, references: &References) -> Result<String> {
        let notice = match references {
            References::AccessRestricted => Some(ACCESS_RESTRICTED),
            References::PartialLimitation => Some(PARTIAL_LIMITATION),
            References::NoneFound => Some(NONE_FOUND),
            References::Entries(_) => None,
        };
        let entries: Vec<EntryView> = match references {
            References::Entries(entries) => entries
                .iter()
                .map(|e| EntryView {
                    label: e.label(),
                    href: match e {
                        ReferenceEntry::Link { href, .. } => {
                            Some(Value::from_safe_string(href.clone()))
                        }
                        ReferenceEntry::Error { .. } => None,
                    },
                })
                .collect(),
            _ => Vec::new(),
        };
        let html = self
            .env
            .get_template("bot_message.html")?
            .render(context! { answer => answer, notice => notice, entries => entries })?;
        Ok(html)
    }

    /// User bubble. `msg` is plain text and gets escaped.
    pub fn user_bubble(&self, msg: &str) -> Result<String> {
        Ok(self
            .env
            .get_template("user.html")?
            .render(context! { MSG => msg, avatar => USER_AVATAR })?)
    }

    /// Bot bubble. `html` is trusted markup from [`Renderer::bot_message`].
    pub fn bot_bubble(&self, html: &str) -> Result<String> {
        Ok(self.env.get_template("bot.html")?.render(context! {
            MSG => Value::from_safe_string(html.to_string()),
            avatar => BOT_AVATAR,
        })?)
    }

    fn pair_html(&self, pair: &QaPair) -> Result<String> {
        Ok(format!(
            "{}{}",
            self.user_bubble(&pair.user)?,
            self.bot_bubble(&pair.bot)?
        ))
    }

    pub fn page(&self, view: &PageView) -> Result<String> {
        let bubbles = view
            .history
            .iter()
            .map(|p| self.pair_html(p).map(Value::from_safe_string))
            .collect::<Result<Vec<_>>>()?;
        let selected = view
            .selected
            .as_ref()
            .map(|p| self.pair_html(p).map(Value::from_safe_string))
            .transpose()?;

        Ok(self.env.get_template("page.html")?.render(context! {
            css => Value::from_safe_string(CSS.to_string()),
            notice => &view.notice,
            documents => &view.documents,
            sidebar => &view.sidebar,
            bubbles => bubbles,
            selected => selected,
        })?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renderer() -> Renderer {
        Renderer::new().unwrap()
    }

    #[test]
    fn bot_message_with_no_references() {
        let html = renderer()
            .bot_message("The answer.", &References::NoneFound)
            .unwrap();
        assert!(html.starts_with("The answer."));
        assert!(html.contains("<strong>References:</strong>"));
        assert!(html.contains("No references found."));
    }

    #[test]
    fn bot_message_escapes_answer() {
        let html = renderer()
            .bot_message("<script>x</script>", &References::NoneFound)
            .unwrap();
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn bot_message_renders_links_and_errors() {
        let refs = References::Entries(vec![
            ReferenceEntry::Link {
                document_index: 0,
                page_number: 2,
                href: "data:application/pdf;base64,AA==#page=2".to_string(),
            },
            ReferenceEntry::Error {
                page_number: 5,
                message: "no uploaded document at index 1".to_string(),
            },
        ]);
        let html = renderer().bot_message("ok", &refs).unwrap();
        assert!(html.contains(r#"target="_blank">Page 2</a>"#));
        assert!(html.contains("Error generating link for page 5"));
    }

    #[test]
    fn user_bubble_escapes_and_bot_bubble_does_not() {
        let r = renderer();
        let user = r.user_bubble("a < b").unwrap();
        assert!(user.contains("a &lt; b"));
        assert!(user.contains("chat-message user"));
        let bot = r.bot_bubble("<strong>x</strong>").unwrap();
        assert!(bot.contains("<strong>x</strong>"));
        assert!(bot.contains(BOT_AVATAR));
    }

    #[test]
    fn page_with_selection_hides_history_and_input() {
        let view = PageView {
            history: vec![QaPair {
                user: "full history question".to_string(),
                bot: "full history answer".to_string(),
            }],
            selected: Some(QaPair {
                user: "picked question".to_string(),
                bot: "picked answer".to_string(),
            }),
            ..Default::default()
        };
        let html = renderer().page(&view).unwrap();
        assert!(html.contains("picked question"));
        assert!(!html.contains("full history question"));
        assert!(!html.contains("Enter Your Query Prompt:"));
        assert!(html.contains("Back to chat"));
    }

    #[test]
    fn page_without_selection_shows_history_and_input() {
        let view = PageView {
            history: vec![QaPair {
                user: "q1".to_string(),
                bot: "a1".to_string(),
            }],
            notice: Some(Notice::warning("No content found to process.")),
            ..Default::default()
        };
        let html = renderer().page(&view).unwrap();
        assert!(html.contains("q1"));
        assert!(html.contains("Enter Your Query Prompt:"));
        assert!(html.contains("notice warning"));
    }
}
