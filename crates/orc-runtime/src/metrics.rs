use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use orc_config::MetricsConfig;

/// Shared orchestrator metrics store.
///
/// Counters are lock-free atomics. The verdict label set is fixed at
/// startup (green/yellow/red) to keep hot-path updates allocation-free.
pub struct OrchestratorMetrics {
    tasks_started_total: AtomicU64,
    tasks_completed_by_verdict: BTreeMap<String, AtomicU64>,
    tasks_retried_total: AtomicU64,

    waves_started_total: AtomicU64,
    waves_completed_total: AtomicU64,

    package_guard_contention_total: AtomicU64,
    agent_invocations_total: AtomicU64,
    agent_invocation_failures_total: AtomicU64,
    qc_reviews_total: AtomicU64,
}

impl OrchestratorMetrics {
    pub fn new() -> Self {
        let mut by_verdict = BTreeMap::new();
        for verdict in ["green", "yellow", "red"] {
            by_verdict.insert(verdict.to_string(), AtomicU64::new(0));
        }

        Self {
            tasks_started_total: AtomicU64::new(0),
            tasks_completed_by_verdict: by_verdict,
            tasks_retried_total: AtomicU64::new(0),
            waves_started_total: AtomicU64::new(0),
            waves_completed_total: AtomicU64::new(0),
            package_guard_contention_total: AtomicU64::new(0),
            agent_invocations_total: AtomicU64::new(0),
            agent_invocation_failures_total: AtomicU64::new(0),
            qc_reviews_total: AtomicU64::new(0),
        }
    }

    pub fn inc_task_started(&self) {
        self.tasks_started_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_task_completed(&self, verdict: &str) {
        if let Some(v) = self.tasks_completed_by_verdict.get(verdict) {
            v.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn inc_task_retried(&self) {
        self.tasks_retried_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_wave_started(&self) {
        self.waves_started_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_wave_completed(&self) {
        self.waves_completed_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_package_guard_contention(&self) {
        self.package_guard_contention_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_agent_invocation(&self, succeeded: bool) {
        self.agent_invocations_total.fetch_add(1, Ordering::Relaxed);
        if !succeeded {
            self.agent_invocation_failures_total
                .fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn inc_qc_review(&self) {
        self.qc_reviews_total.fetch_add(1, Ordering::Relaxed);
    }

    fn render_prometheus(&self) -> String {
        let mut out = String::with_capacity(4 * 1024);

        self.render_counter(
            &mut out,
            "orc_tasks_started_total",
            self.tasks_started_total.load(Ordering::Relaxed),
        );
        for (verdict, value) in &self.tasks_completed_by_verdict {
            self.render_counter_labeled(
                &mut out,
                "orc_tasks_completed_total",
                &[("verdict", verdict)],
                value.load(Ordering::Relaxed),
            );
        }
        self.render_counter(
            &mut out,
            "orc_tasks_retried_total",
            self.tasks_retried_total.load(Ordering::Relaxed),
        );
        self.render_counter(
            &mut out,
            "orc_waves_started_total",
            self.waves_started_total.load(Ordering::Relaxed),
        );
        self.render_counter(
            &mut out,
            "orc_waves_completed_total",
            self.waves_completed_total.load(Ordering::Relaxed),
        );
        self.render_counter(
            &mut out,
            "orc_package_guard_contention_total",
            self.package_guard_contention_total.load(Ordering::Relaxed),
        );
        self.render_counter(
            &mut out,
            "orc_agent_invocations_total",
            self.agent_invocations_total.load(Ordering::Relaxed),
        );
        self.render_counter(
            &mut out,
            "orc_agent_invocation_failures_total",
            self.agent_invocation_failures_total.load(Ordering::Relaxed),
        );
        self.render_counter(
            &mut out,
            "orc_qc_reviews_total",
            self.qc_reviews_total.load(Ordering::Relaxed),
        );

        out
    }

    fn render_counter(&self, out: &mut String, name: &str, value: u64) {
        let _ = writeln!(out, "# TYPE {name} counter");
        let _ = writeln!(out, "{name} {value}");
    }

    fn render_counter_labeled(
        &self,
        out: &mut String,
        name: &str,
        labels: &[(&str, &str)],
        value: u64,
    ) {
        let _ = writeln!(out, "# TYPE {name} counter");
        let _ = writeln!(out, "{name}{} {value}", format_labels(labels));
    }

    fn summary_line(&self) -> String {
        format!(
            "tasks_started={} tasks_retried={} waves_completed={} agent_invocations={} qc_reviews={}",
            self.tasks_started_total.load(Ordering::Relaxed),
            self.tasks_retried_total.load(Ordering::Relaxed),
            self.waves_completed_total.load(Ordering::Relaxed),
            self.agent_invocations_total.load(Ordering::Relaxed),
            self.qc_reviews_total.load(Ordering::Relaxed),
        )
    }
}

impl Default for OrchestratorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn format_labels(labels: &[(&str, &str)]) -> String {
    if labels.is_empty() {
        return String::new();
    }
    let mut out = String::from("{");
    for (idx, (key, value)) in labels.iter().enumerate() {
        if idx > 0 {
            out.push(',');
        }
        out.push_str(key);
        out.push('=');
        out.push('"');
        for ch in value.chars() {
            match ch {
                '\\' => out.push_str("\\\\"),
                '"' => out.push_str("\\\""),
                '\n' => out.push_str("\\n"),
                _ => out.push(ch),
            }
        }
        out.push('"');
    }
    out.push('}');
    out
}

/// Serve `/metrics` on `config.prometheus_listen` until cancelled, and log
/// a summary line on every `config.report_interval` tick.
pub async fn run_metrics_task(
    metrics: Arc<OrchestratorMetrics>,
    config: MetricsConfig,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&config.prometheus_listen).await?;
    orc_info!(
        sys,
        listen = %config.prometheus_listen,
        interval = %config.report_interval,
        "metrics exporter started"
    );

    let mut tick = tokio::time::interval(config.report_interval.as_duration());
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tick.tick() => {
                orc_info!(res, summary = %metrics.summary_line(), "metrics snapshot");
            }
            result = listener.accept() => {
                let (mut stream, _) = result?;
                let body = metrics.render_prometheus();
                let mut req_buf = [0u8; 512];
                let req_n = stream.read(&mut req_buf).await.unwrap_or(0);
                let is_metrics = req_n > 0
                    && std::str::from_utf8(&req_buf[..req_n]).unwrap_or("").starts_with("GET /metrics");
                if is_metrics {
                    let header = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: text/plain; version=0.0.4\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                        body.len()
                    );
                    stream.write_all(header.as_bytes()).await?;
                    stream.write_all(body.as_bytes()).await?;
                } else {
                    stream
                        .write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                        .await?;
                }
                stream.shutdown().await?;
            }
        }
    }
    Ok(())
}

pub fn maybe_build_metrics(config: &MetricsConfig) -> Option<Arc<OrchestratorMetrics>> {
    if !config.enabled {
        return None;
    }
    Some(Arc::new(OrchestratorMetrics::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment_and_render() {
        let m = OrchestratorMetrics::new();
        m.inc_task_started();
        m.inc_task_completed("green");
        m.inc_task_completed("red");
        m.inc_task_retried();
        m.inc_wave_started();
        m.inc_wave_completed();
        m.inc_package_guard_contention();
        m.inc_agent_invocation(true);
        m.inc_agent_invocation(false);
        m.inc_qc_review();

        let rendered = m.render_prometheus();
        assert!(rendered.contains("orc_tasks_started_total 1"));
        assert!(rendered.contains("orc_tasks_completed_total{verdict=\"green\"} 1"));
        assert!(rendered.contains("orc_tasks_completed_total{verdict=\"red\"} 1"));
        assert!(rendered.contains("orc_agent_invocation_failures_total 1"));
    }

    #[test]
    fn maybe_build_metrics_respects_enabled_flag() {
        let config = MetricsConfig {
            enabled: false,
            ..Default::default()
        };
        assert!(maybe_build_metrics(&config).is_none());
    }
}
