use crate::{
    domain,
    probe::{ProbeOutcome, Prober},
    report::{self, Outcome, Reporter, Summary},
    staralign::{Client, Inbox, Notification, Page, UserId},
};
use snafu::{ResultExt, Snafu};
use std::io::Write;
use tracing::{debug, info, trace_span, warn, Instrument};

#[derive(Debug, Clone, Default)]
pub struct SweepOptions {
    pub page: Page,
    pub user_id: Option<UserId>,
    pub dry_run: bool,
}

pub struct SweepFlow<W> {
    client: Client,
    prober: Prober,
    reporter: Reporter<W>,
    options: SweepOptions,
}

impl<W: Write> SweepFlow<W> {
    pub fn new(client: Client, reporter: Reporter<W>, options: SweepOptions) -> Self {
        Self {
            client,
            prober: Prober::default(),
            reporter,
            options,
        }
    }

    pub async fn sweep(&mut self) -> Result<Summary> {
        let mut summary = Summary::default();

        self.reporter.fetching().context(UnableToReportSnafu)?;
        let inbox = self.fetch().await;
        summary.fetched = inbox.received;
        self.reporter
            .fetched(summary.fetched)
            .context(UnableToReportSnafu)?;

        let friend_requests = domain::friend_requests(&inbox.notifications);
        summary.matched = friend_requests.len();
        self.reporter
            .matched(summary.matched)
            .context(UnableToReportSnafu)?;

        if friend_requests.is_empty() {
            self.reporter
                .nothing_to_remove()
                .context(UnableToReportSnafu)?;
            return Ok(summary);
        }

        for n in friend_requests {
            self.reporter.notification(n).context(UnableToReportSnafu)?;

            let outcome = self.remove(n).await;
            summary.record(outcome);
            self.reporter.outcome(outcome).context(UnableToReportSnafu)?;
        }

        self.reporter
            .summary(&summary)
            .context(UnableToReportSnafu)?;

        Ok(summary)
    }

    /// A failed fetch is reported as an empty inbox rather than aborting.
    async fn fetch(&self) -> Inbox {
        let Self {
            client, options, ..
        } = self;
        let s = trace_span!("fetch", limit = options.page.limit, offset = options.page.offset);

        async {
            match client
                .notifications(options.page, options.user_id.as_ref())
                .await
            {
                Ok(inbox) => inbox,
                Err(e) => {
                    warn!("Treating as zero notifications: {}", e);
                    Inbox::default()
                }
            }
        }
        .instrument(s)
        .await
    }

    async fn remove(&self, n: &Notification) -> Outcome {
        if self.options.dry_run {
            return Outcome::DryRun;
        }

        let id = match n.id() {
            Some(id) => id,
            None => return Outcome::Skipped,
        };

        match self.prober.probe(&self.client, &id).await {
            ProbeOutcome::Deleted { attempts, .. } => {
                debug!("Deleted after {} attempts", attempts);
                Outcome::Deleted
            }
            ProbeOutcome::Exhausted { attempts } => {
                info!("None of {} attempts deleted notification {}", attempts, id);
                Outcome::Failed
            }
        }
    }
}

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("{}", source))]
    UnableToReport { source: report::Error },
}

type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::staralign::{AccessToken, Config};
    use mockito::{Matcher, ServerGuard};

    const INBOX: &str = r#"{
        "code": 200,
        "data": [
            {"id": 1, "type": "friend_request", "text": "wants to connect", "notifier": {"username": "ana"}},
            {"id": 2, "type": "like", "text": "liked your post"},
            {"notification_id": "3", "type": "FRIEND_REQUEST", "notifier": {"full_name": "Bo"}},
            {"type": "friend_request", "text": "no id here"}
        ]
    }"#;

    async fn inbox(server: &mut ServerGuard, body: &str) {
        server
            .mock("POST", "/notifications/get_notifications")
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;
    }

    fn flow(server: &ServerGuard, dry_run: bool) -> SweepFlow<Vec<u8>> {
        let client = Config::new(server.url()).into_client(AccessToken("tok".into()));
        let options = SweepOptions {
            dry_run,
            ..SweepOptions::default()
        };
        SweepFlow::new(client, Reporter::new(Vec::new()), options)
    }

    fn report(flow: SweepFlow<Vec<u8>>) -> String {
        String::from_utf8(flow.reporter.into_inner()).unwrap()
    }

    #[tokio::test]
    async fn dry_run_never_deletes() {
        let mut server = mockito::Server::new_async().await;
        inbox(&mut server, INBOX).await;
        let deletes = server
            .mock("POST", Matcher::Regex("^/notifications/(delete|remove|mark_as|seen)".into()))
            .with_status(200)
            .expect(0)
            .create_async()
            .await;

        let mut flow = flow(&server, true);
        let summary = flow.sweep().await.unwrap();

        assert_eq!(summary.fetched, 4);
        assert_eq!(summary.matched, 3);
        assert_eq!(summary.listed, 3);
        assert_eq!(summary.deleted, 0);
        deletes.assert_async().await;

        let report = report(flow);
        assert!(report.contains("id=1 type=friend_request notifier=ana text=wants to connect"));
        assert!(report.contains("id=3 type=FRIEND_REQUEST notifier=Bo text="));
        assert!(!report.contains("liked your post"));
    }

    #[tokio::test]
    async fn deletes_each_friend_request_once() {
        let mut server = mockito::Server::new_async().await;
        inbox(&mut server, INBOX).await;
        let first = server
            .mock("POST", "/notifications/delete")
            .match_body(Matcher::UrlEncoded("id".into(), "1".into()))
            .with_status(200)
            .with_body(r#"{"code":200}"#)
            .expect(1)
            .create_async()
            .await;
        let third = server
            .mock("POST", "/notifications/delete")
            .match_body(Matcher::UrlEncoded("id".into(), "3".into()))
            .with_status(200)
            .with_body(r#"{"code":200}"#)
            .expect(1)
            .create_async()
            .await;

        let mut flow = flow(&server, false);
        let summary = flow.sweep().await.unwrap();

        assert_eq!(summary.deleted, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 0);
        first.assert_async().await;
        third.assert_async().await;

        let report = report(flow);
        assert!(report.contains("  -> skipping (no id)"));
        assert!(report.ends_with("2 deleted, 0 failed, 1 skipped\nDone.\n"));
    }

    #[tokio::test]
    async fn reports_friend_requests_no_endpoint_would_delete() {
        let mut server = mockito::Server::new_async().await;
        inbox(
            &mut server,
            r#"{"code":200,"data":[{"id":8,"type":"friend_request","notifier":[]},"junk"]}"#,
        )
        .await;
        let deletes = server
            .mock("POST", Matcher::Regex("^/notifications/(delete|remove|mark_as|seen)".into()))
            .with_status(200)
            .with_body(r#"{"code":400}"#)
            .expect(14)
            .create_async()
            .await;

        let mut flow = flow(&server, false);
        let summary = flow.sweep().await.unwrap();

        assert_eq!(summary.fetched, 2);
        assert_eq!(summary.matched, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.deleted, 0);
        deletes.assert_async().await;

        let report = report(flow);
        assert!(report.contains("Fetched 2 notifications"));
        assert!(report.contains("id=8 type=friend_request notifier= text="));
        assert!(report.contains("  -> failed to delete (see logs above)"));
        assert!(report.ends_with("1 matched, 0 deleted, 1 failed, 0 skipped\nDone.\n"));
    }

    #[tokio::test]
    async fn failed_fetch_means_nothing_to_do() {
        let mut server = mockito::Server::new_async().await;
        inbox(&mut server, "<html>502 Bad Gateway</html>").await;

        let mut flow = flow(&server, false);
        let summary = flow.sweep().await.unwrap();

        assert_eq!(summary, Summary::default());
        assert_eq!(
            report(flow),
            "Fetching notifications...\n\
             Fetched 0 notifications\n\
             Found 0 friend-request notifications\n\
             Nothing to remove. Exiting.\n"
        );
    }

    #[tokio::test]
    async fn unreachable_backend_means_nothing_to_do() {
        let client = Config::new("http://127.0.0.1:9").into_client(AccessToken("tok".into()));
        let mut flow = SweepFlow::new(client, Reporter::new(Vec::new()), SweepOptions::default());

        let summary = flow.sweep().await.unwrap();
        assert_eq!(summary.fetched, 0);
    }
}
