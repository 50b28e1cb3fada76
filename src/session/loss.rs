use anyhow::bail;

/// Loss as seen by the receiver when the sender's 'stat' message arrives
#[derive(Debug, Clone, PartialEq)]
pub struct LossReport {
    pub sent: i64,
    pub received: u64,
    /// `(sent - received) / sent * 100`. This is negative if the receiver saw more messages
    ///  than were sent (e.g. duplicates, or traffic from a second sender).
    pub loss_percent: f64,
}

impl LossReport {
    /// A sent count of 0 is an error rather than '0% loss': there is nothing the received
    ///  count could be compared to.
    pub fn compute(sent: i64, received: u64) -> anyhow::Result<LossReport> {
        if sent == 0 {
            bail!("stat message reports 0 messages sent - cannot compute loss for {} received messages", received);
        }

        let loss_percent = (sent as f64 - received as f64) * 100.0 / sent as f64;
        Ok(LossReport {
            sent,
            received,
            loss_percent,
        })
    }

    pub fn report_lines(&self) -> [String; 2] {
        [
            format!("{} msgs sent, {} received (not including 'stat')", self.sent, self.received),
            format!("{:.6}% loss", self.loss_percent),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::no_loss(6, 6, 0.0)]
    #[case::partial(6, 4, 33.333333)]
    #[case::total(6, 0, 100.0)]
    #[case::half(1000, 500, 50.0)]
    #[case::more_received_than_sent(4, 5, -25.0)]
    fn test_compute(#[case] sent: i64, #[case] received: u64, #[case] expected: f64) {
        let report = LossReport::compute(sent, received).unwrap();
        assert!((report.loss_percent - expected).abs() < 1e-4, "{} != {}", report.loss_percent, expected);
    }

    #[rstest]
    #[case::nothing_received(0)]
    #[case::something_received(3)]
    fn test_zero_sent_is_an_error(#[case] received: u64) {
        assert!(LossReport::compute(0, received).is_err());
    }

    #[test]
    fn test_report_lines() {
        let report = LossReport::compute(6, 4).unwrap();
        let [summary, loss] = report.report_lines();
        assert_eq!(summary, "6 msgs sent, 4 received (not including 'stat')");
        assert_eq!(loss, "33.333333% loss");
    }
}
