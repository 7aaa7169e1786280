use crate::staralign::{
    Client, DeleteResponse, NotificationId, CANDIDATE_DELETE_PATHS, CANDIDATE_ID_PARAMS,
};
use tracing::{info, trace, trace_span, warn, Instrument};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Deleted {
        path: &'static str,
        param: &'static str,
        response: DeleteResponse,
        attempts: usize,
    },
    Exhausted {
        attempts: usize,
    },
}

/// Walks the candidate delete endpoints until the backend accepts one.
///
/// There's no documented delete call, so every path is tried with every
/// identifier parameter name. Earlier candidates can have side effects (for
/// example marking the notification as read) even when they don't report
/// success.
#[derive(Debug, Clone)]
pub struct Prober {
    paths: &'static [&'static str],
    params: &'static [&'static str],
}

impl Default for Prober {
    fn default() -> Self {
        Self {
            paths: CANDIDATE_DELETE_PATHS,
            params: CANDIDATE_ID_PARAMS,
        }
    }
}

impl Prober {
    fn candidates(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        let params = self.params;
        self.paths
            .iter()
            .flat_map(move |path| params.iter().map(move |param| (*path, *param)))
    }

    pub async fn probe(&self, client: &Client, id: &NotificationId) -> ProbeOutcome {
        let s = trace_span!("probe", id = %id);

        async {
            trace!("Probing delete endpoints");
            let mut attempts = 0;

            for (path, param) in self.candidates() {
                attempts += 1;

                let response = match client.delete(path, param, id).await {
                    Ok(response) => response,
                    Err(e) => {
                        warn!("Attempt via {} with param {} failed: {}", path, param, e);
                        continue;
                    }
                };

                match &response {
                    DeleteResponse::Confirmed => {
                        info!(
                            "Deleted notification {} via {} param {} (backend code=200)",
                            id, path, param
                        );
                    }
                    DeleteResponse::Assumed => {
                        info!(
                            "Deleted notification {} via {} param {} (HTTP 200, non-JSON response)",
                            id, path, param
                        );
                    }
                    DeleteResponse::Rejected { code, body } => {
                        warn!("Tried {} ({}) returned code={} body={}", path, param, code, body);
                        continue;
                    }
                    DeleteResponse::HttpFailure { status, body } => {
                        warn!("Tried {} ({}) -> HTTP {}: {}", path, param, status, body);
                        continue;
                    }
                }

                return ProbeOutcome::Deleted {
                    path,
                    param,
                    response,
                    attempts,
                };
            }

            ProbeOutcome::Exhausted { attempts }
        }
        .instrument(s)
        .await
    }
}
