//! Notification trigger.
//!
//! The comment engine decides *whether* a notification is due; this module
//! decides *to whom* it renders and hands it to the mail collaborator.
//! Dispatch is fire-and-forget through a channel drained by a background
//! worker: a failed or missing worker drops the event silently and never
//! fails the comment submission that produced it.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::OnceCell;

/// A notification event produced by a successful comment submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// A visitor commented on a post; tell the operator.
    NewCommentOnPost { post_id: i64, post_title: String },
    /// Someone replied to a comment; tell that comment's author.
    NewReplyToComment {
        post_id: i64,
        post_title: String,
        to_email: String,
    },
}

/// The outbound mail collaborator. Delivery mechanics live behind this
/// trait; the core never waits for, or learns about, the delivery outcome.
pub trait Mailer: Send + Sync + 'static {
    fn send(&self, subject: &str, to: &str, html: &str);
}

/// Default collaborator: writes the message to the log instead of an SMTP
/// relay.
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, subject: &str, to: &str, html: &str) {
        tracing::info!(subject, to, body_len = html.len(), "outgoing mail");
    }
}

#[derive(Debug, Clone)]
pub struct NotifyConfig {
    /// Recipient of new-comment notifications.
    pub operator_email: String,
    /// Base for absolute post URLs in mail bodies.
    pub site_url: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            operator_email: std::env::var("OPERATOR_EMAIL")
                .unwrap_or_else(|_| "admin@example.com".to_string()),
            site_url: std::env::var("SITE_URL")
                .unwrap_or_else(|_| "http://localhost:3001".to_string()),
        }
    }
}

/// Absolute URL of a post's comment section.
fn post_url(site_url: &str, post_id: i64) -> String {
    format!("{}/posts/{}#comments", site_url.trim_end_matches('/'), post_id)
}

/// Render a notification into (subject, recipient, html body).
pub fn render(notification: &Notification, config: &NotifyConfig) -> (String, String, String) {
    match notification {
        Notification::NewCommentOnPost { post_id, post_title } => {
            let url = post_url(&config.site_url, *post_id);
            (
                "New comment".to_string(),
                config.operator_email.clone(),
                format!(
                    "<p>New comment on post <i>{post_title}</i>, click the link below to check:</p>\
                     <p><a href=\"{url}\">{url}</a></p>\
                     <p><small style=\"color: #868e96\">Do not reply this email.</small></p>"
                ),
            )
        }
        Notification::NewReplyToComment {
            post_id,
            post_title,
            to_email,
        } => {
            let url = post_url(&config.site_url, *post_id);
            (
                "New reply".to_string(),
                to_email.clone(),
                format!(
                    "<p>New reply for the comment you left in post <i>{post_title}</i>, \
                     click the link below to check:</p>\
                     <p><a href=\"{url}\">{url}</a></p>\
                     <p><small style=\"color: #868e96\">Do not reply this email.</small></p>"
                ),
            )
        }
    }
}

/// Handle to the dispatch worker.
#[derive(Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl Notifier {
    /// Spawn the worker task that drains the channel and hands rendered
    /// messages to the mailer.
    pub fn spawn(mailer: Arc<dyn Mailer>, config: NotifyConfig) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Notification>();

        tokio::spawn(async move {
            while let Some(notification) = rx.recv().await {
                let (subject, to, html) = render(&notification, &config);
                mailer.send(&subject, &to, &html);
            }
        });

        Self { tx }
    }

    /// Queue a notification. Errors (worker gone) are swallowed.
    pub fn dispatch(&self, notification: Notification) {
        if self.tx.send(notification).is_err() {
            tracing::warn!("notification worker is gone, event dropped");
        }
    }
}

static NOTIFIER: OnceCell<Notifier> = OnceCell::const_new();

/// Install the process-wide notifier. Later calls are ignored.
pub fn init(notifier: Notifier) {
    let _ = NOTIFIER.set(notifier);
}

/// Fire-and-forget dispatch through the process-wide notifier. A missing
/// notifier (tests, early startup) drops the event.
pub fn dispatch(notification: Notification) {
    if let Some(notifier) = NOTIFIER.get() {
        notifier.dispatch(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn test_config() -> NotifyConfig {
        NotifyConfig {
            operator_email: "operator@example.com".into(),
            site_url: "https://blog.example/".into(),
        }
    }

    #[test]
    fn test_post_url_joins_cleanly() {
        assert_eq!(
            post_url("https://blog.example/", 3),
            "https://blog.example/posts/3#comments"
        );
        assert_eq!(
            post_url("https://blog.example", 3),
            "https://blog.example/posts/3#comments"
        );
    }

    #[test]
    fn test_render_new_comment_targets_operator() {
        let (subject, to, html) = render(
            &Notification::NewCommentOnPost {
                post_id: 7,
                post_title: "Hello".into(),
            },
            &test_config(),
        );
        assert_eq!(subject, "New comment");
        assert_eq!(to, "operator@example.com");
        assert!(html.contains("https://blog.example/posts/7#comments"));
        assert!(html.contains("<i>Hello</i>"));
    }

    #[test]
    fn test_render_new_reply_targets_parent_author() {
        let (subject, to, html) = render(
            &Notification::NewReplyToComment {
                post_id: 7,
                post_title: "Hello".into(),
                to_email: "reader@example.com".into(),
            },
            &test_config(),
        );
        assert_eq!(subject, "New reply");
        assert_eq!(to, "reader@example.com");
        assert!(html.contains("#comments"));
    }

    struct RecordingMailer {
        sent: Mutex<Vec<(String, String)>>,
        wake: mpsc::UnboundedSender<()>,
    }

    impl Mailer for RecordingMailer {
        fn send(&self, subject: &str, to: &str, _html: &str) {
            self.sent
                .lock()
                .unwrap()
                .push((subject.to_string(), to.to_string()));
            let _ = self.wake.send(());
        }
    }

    #[tokio::test]
    async fn test_worker_drains_the_channel() {
        let (wake, mut woken) = mpsc::unbounded_channel();
        let mailer = Arc::new(RecordingMailer {
            sent: Mutex::new(Vec::new()),
            wake,
        });

        let notifier = Notifier::spawn(mailer.clone(), test_config());
        notifier.dispatch(Notification::NewCommentOnPost {
            post_id: 1,
            post_title: "One".into(),
        });
        notifier.dispatch(Notification::NewReplyToComment {
            post_id: 1,
            post_title: "One".into(),
            to_email: "reader@example.com".into(),
        });

        woken.recv().await.unwrap();
        woken.recv().await.unwrap();

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0, "New comment");
        assert_eq!(sent[1].1, "reader@example.com");
    }

    #[test]
    fn test_global_dispatch_without_notifier_is_a_noop() {
        // No init() in this process path: the event is dropped silently.
        dispatch(Notification::NewCommentOnPost {
            post_id: 1,
            post_title: "One".into(),
        });
    }
}
