// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present RINA (Rust) Contributors

//! DTCP (Data Transfer Control Protocol): acknowledgement, flow control
//! (window and/or rate), retransmission, and RTT estimation, operating
//! alongside a connection's [`super::dtp::Dtp`].
//!
//! Window and rate flow control are independently optional, matching the
//! `rust-p2p-efcp` reference's `WindowFlowControl`/`RateFlowControl` split;
//! [`Dtcp::window_open`] checks rate admission before window admission,
//! resolving the spec's window-vs-rate ordering question in favour of
//! "rate first, then window".

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use super::timer::Timer;

/// Window-based flow control: sender credit and receiver window edges.
#[derive(Debug, Clone)]
pub struct WindowFlowControl {
    pub send_left_we: u64,
    pub send_right_we: u64,
    pub recv_left_we: u64,
    pub recv_right_we: u64,
}

impl WindowFlowControl {
    pub fn new(initial_credit: u64) -> Self {
        Self {
            send_left_we: 0,
            send_right_we: initial_credit,
            recv_left_we: 0,
            recv_right_we: initial_credit,
        }
    }

    /// Whether `seq` is still within the sender's window.
    pub fn window_open(&self, seq: u64) -> bool {
        seq < self.send_right_we
    }

    /// Advances the sender's right-window-edge by `credit`, returning the
    /// previous edge so callers can tell how many new sequence numbers
    /// were released.
    pub fn advance_send_window(&mut self, new_rwe: u64) {
        self.send_right_we = self.send_right_we.max(new_rwe);
    }
}

/// Rate-based flow control: at most `sending_rate` PDUs per `time_unit`.
#[derive(Debug, Clone)]
pub struct RateFlowControl {
    pub time_unit: Duration,
    pub sending_rate: u32,
    pub pdus_sent_in_unit: u32,
    unit_started_at: Instant,
}

impl RateFlowControl {
    pub fn new(time_unit: Duration, sending_rate: u32, now: Instant) -> Self {
        Self {
            time_unit,
            sending_rate,
            pdus_sent_in_unit: 0,
            unit_started_at: now,
        }
    }

    fn roll_if_elapsed(&mut self, now: Instant) {
        if now.duration_since(self.unit_started_at) >= self.time_unit {
            self.pdus_sent_in_unit = 0;
            self.unit_started_at = now;
        }
    }

    pub fn window_open(&mut self, now: Instant) -> bool {
        self.roll_if_elapsed(now);
        self.pdus_sent_in_unit < self.sending_rate
    }

    pub fn register_sent(&mut self, now: Instant) {
        self.roll_if_elapsed(now);
        self.pdus_sent_in_unit += 1;
    }
}

/// RTT estimator: `srtt = (1-a)*srtt + a*sample`,
/// `rttvar = (1-b)*rttvar + b*|sample - srtt|`.
#[derive(Debug, Clone)]
pub struct RttEstimator {
    pub srtt: Duration,
    pub rttvar: Duration,
    alpha: f64,
    beta: f64,
}

impl Default for RttEstimator {
    fn default() -> Self {
        Self {
            srtt: Duration::from_millis(100),
            rttvar: Duration::from_millis(50),
            alpha: 0.125,
            beta: 0.25,
        }
    }
}

impl RttEstimator {
    pub fn sample(&mut self, rtt: Duration) {
        let srtt = self.srtt.as_secs_f64();
        let sample = rtt.as_secs_f64();
        let new_srtt = (1.0 - self.alpha) * srtt + self.alpha * sample;
        let new_rttvar =
            (1.0 - self.beta) * self.rttvar.as_secs_f64() + self.beta * (sample - srtt).abs();
        self.srtt = Duration::from_secs_f64(new_srtt.max(0.0));
        self.rttvar = Duration::from_secs_f64(new_rttvar.max(0.0));
    }

    /// Retransmission timer: `2*mpl + A + estimation error`, as the
    /// reference describes; approximated here as `srtt + 4*rttvar`.
    pub fn retransmission_timeout(&self) -> Duration {
        self.srtt + self.rttvar * 4
    }
}

/// One entry in the retransmission queue.
#[derive(Debug, Clone)]
pub struct RtxEntry {
    pub sequence_number: u64,
    pub payload: Vec<u8>,
    pub first_send_time: Instant,
    pub retries: u32,
}

/// Ordered queue of unacknowledged DT PDUs awaiting retransmission.
#[derive(Debug, Default)]
pub struct RetransmissionQueue {
    entries: VecDeque<RtxEntry>,
    pub max_retries: u32,
}

impl RetransmissionQueue {
    pub fn new(max_retries: u32) -> Self {
        Self {
            entries: VecDeque::new(),
            max_retries,
        }
    }

    pub fn push(&mut self, sequence_number: u64, payload: Vec<u8>, now: Instant) {
        self.entries.push_back(RtxEntry {
            sequence_number,
            payload,
            first_send_time: now,
            retries: 0,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// ACK cumulativity: discards every entry with `sequence_number <= s`.
    /// Returns the discarded entries (their RTT samples feed the
    /// estimator).
    pub fn ack(&mut self, s: u64) -> Vec<RtxEntry> {
        let mut discarded = Vec::new();
        while let Some(front) = self.entries.front() {
            if front.sequence_number <= s {
                discarded.push(self.entries.pop_front().unwrap());
            } else {
                break;
            }
        }
        discarded
    }

    /// NACK: marks every entry with `sequence_number >= seq` as eligible
    /// for retransmission and returns their payloads, bumping each
    /// entry's retry counter. Entries exceeding `max_retries` are dropped
    /// and reported as broken (flow declared broken per S4).
    pub fn nack(&mut self, seq: u64, now: Instant) -> (Vec<Vec<u8>>, bool) {
        let mut to_resend = Vec::new();
        let mut broken = false;
        for entry in self.entries.iter_mut().filter(|e| e.sequence_number >= seq) {
            entry.retries += 1;
            if entry.retries > self.max_retries {
                broken = true;
                continue;
            }
            entry.first_send_time = now;
            to_resend.push(entry.payload.clone());
        }
        (to_resend, broken)
    }
}

/// Closed-window queue: DUs held while the sender's window is closed.
#[derive(Debug, Default)]
pub struct ClosedWindowQueue {
    queue: VecDeque<Vec<u8>>,
    pub max_len: usize,
}

impl ClosedWindowQueue {
    pub fn new(max_len: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            max_len,
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.queue.len() >= self.max_len
    }

    pub fn push(&mut self, payload: Vec<u8>) -> Result<(), Vec<u8>> {
        if self.is_full() {
            return Err(payload);
        }
        self.queue.push_back(payload);
        Ok(())
    }

    /// Drains as many queued payloads as `credit` allows.
    pub fn drain(&mut self, credit: usize) -> Vec<Vec<u8>> {
        let n = credit.min(self.queue.len());
        self.queue.drain(..n).collect()
    }
}

/// DTCP control state for one connection.
#[derive(Debug)]
pub struct Dtcp {
    pub window: Option<WindowFlowControl>,
    pub rate: Option<RateFlowControl>,
    pub rtt: RttEstimator,
    pub retransmission: Option<RetransmissionQueue>,
    pub closed_window_queue: ClosedWindowQueue,
    pub next_snd_ctl_seq: u64,
    pub last_rcv_ctl_seq: u64,
    pub duplicate_control_pdus: u64,
    /// R-timer: bounds how long an unacknowledged PDU may sit in the
    /// retransmission queue before the connection is declared broken.
    /// Armed when the queue goes from empty to non-empty, cancelled when
    /// it drains back to empty; a caller that wants to observe expiry
    /// (and react by tearing the flow down) registers a sink via
    /// [`Dtcp::set_r_timer_sink`].
    r_timer: Timer,
    r_timer_sink: Option<mpsc::Sender<()>>,
    /// tr-timer: per-PDU retransmission interval. Re-armed whenever the
    /// oldest unacknowledged entry changes (a new send, or the head of
    /// the queue being acked/discarded); fires once `tr` elapses without
    /// that entry being acked, signalling the owner to retransmit it.
    /// Configured via `tr_timer_ms` on the connection's constants.
    tr_timer: Timer,
    tr_timer_sink: Option<mpsc::Sender<()>>,
    tr_duration: Option<Duration>,
    /// Sender-side rendezvous timer: armed after every send when the
    /// closed-window queue and retransmission queue are both empty (no
    /// data flowing); fires once `rendezvous_ms` of idleness elapses,
    /// signalling the owner to emit a RENDEZVOUS PDU.
    rendezvous_timer: Timer,
    rendezvous_sink: Option<mpsc::Sender<()>>,
    rendezvous_duration: Option<Duration>,
}

impl Dtcp {
    pub fn new(
        window: Option<WindowFlowControl>,
        rate: Option<RateFlowControl>,
        retransmission: Option<RetransmissionQueue>,
        cwq_max_len: usize,
    ) -> Self {
        Self {
            window,
            rate,
            rtt: RttEstimator::default(),
            retransmission,
            closed_window_queue: ClosedWindowQueue::new(cwq_max_len),
            next_snd_ctl_seq: 1,
            last_rcv_ctl_seq: 0,
            duplicate_control_pdus: 0,
            r_timer: Timer::new(),
            r_timer_sink: None,
            tr_timer: Timer::new(),
            tr_timer_sink: None,
            tr_duration: None,
            rendezvous_timer: Timer::new(),
            rendezvous_sink: None,
            rendezvous_duration: None,
        }
    }

    /// Enables the tr-timer: `duration` bounds how long the oldest
    /// unacknowledged entry may sit before being retried, independent of
    /// any NACK; `sink` receives a notification each time it fires.
    pub fn configure_tr_timer(&mut self, duration: Duration, sink: mpsc::Sender<()>) {
        self.tr_duration = Some(duration);
        self.tr_timer_sink = Some(sink);
    }

    /// Enables the sender-side rendezvous timer: `duration` is the idle
    /// gap after which, with nothing queued or outstanding, a RENDEZVOUS
    /// PDU should be emitted; `sink` receives the fire notification.
    pub fn configure_rendezvous_timer(&mut self, duration: Duration, sink: mpsc::Sender<()>) {
        self.rendezvous_duration = Some(duration);
        self.rendezvous_sink = Some(sink);
    }

    fn rearm_tr_timer(&self) {
        if let (Some(duration), Some(sink)) = (self.tr_duration, self.tr_timer_sink.as_ref()) {
            match self.retransmission.as_ref() {
                Some(rtx) if !rtx.is_empty() => self.tr_timer.arm(duration, sink.clone()),
                _ => self.tr_timer.cancel(),
            }
        }
    }

    fn rearm_rendezvous_timer(&self) {
        if let (Some(duration), Some(sink)) = (self.rendezvous_duration, self.rendezvous_sink.as_ref()) {
            let idle = self.closed_window_queue.is_empty()
                && self.retransmission.as_ref().is_none_or(|rtx| rtx.is_empty());
            if idle {
                self.rendezvous_timer.arm(duration, sink.clone());
            } else {
                self.rendezvous_timer.cancel();
            }
        }
    }

    /// Registers where R-timer expiry notifications are delivered. Until
    /// this is called the R-timer still tracks queue occupancy but never
    /// actually arms a sleep, since there would be nowhere to send the
    /// fire event.
    pub fn set_r_timer_sink(&mut self, sink: mpsc::Sender<()>) {
        self.r_timer_sink = Some(sink);
    }

    fn rearm_r_timer_if_needed(&self, was_empty_before: bool) {
        if was_empty_before {
            if let (Some(rtx), Some(sink)) = (self.retransmission.as_ref(), self.r_timer_sink.as_ref()) {
                if !rtx.is_empty() {
                    let bound = self.rtt.retransmission_timeout() * (rtx.max_retries + 1);
                    self.r_timer.arm(bound, sink.clone());
                }
            }
        }
    }

    /// Admission check for sending sequence number `seq`: rate is
    /// checked before window (resolves the spec's Open Question on
    /// combined rate+window flow control).
    pub fn window_open(&mut self, seq: u64, now: Instant) -> bool {
        if let Some(rate) = self.rate.as_mut() {
            if !rate.window_open(now) {
                return false;
            }
        }
        if let Some(window) = self.window.as_ref() {
            if !window.window_open(seq) {
                return false;
            }
        }
        true
    }

    pub fn register_sent(&mut self, seq: u64, payload: Vec<u8>, now: Instant) {
        if let Some(rate) = self.rate.as_mut() {
            rate.register_sent(now);
        }
        let was_empty = match self.retransmission.as_ref() {
            Some(rtx) => rtx.is_empty(),
            None => true,
        };
        if let Some(rtx) = self.retransmission.as_mut() {
            rtx.push(seq, payload, now);
        }
        self.rearm_r_timer_if_needed(was_empty);
        self.rearm_tr_timer();
        self.rearm_rendezvous_timer();
    }

    /// Assigns and advances the next control sequence number.
    pub fn next_control_sequence(&mut self) -> u64 {
        let seq = self.next_snd_ctl_seq;
        self.next_snd_ctl_seq += 1;
        seq
    }

    /// `dtcp_common_rcv_control`: classifies an incoming control PDU by
    /// its control sequence number before any type-specific handling.
    pub fn common_rcv_control(&mut self, ctrl_seq: u64) -> ControlRcvOutcome {
        if ctrl_seq <= self.last_rcv_ctl_seq {
            self.duplicate_control_pdus += 1;
            return ControlRcvOutcome::Duplicate;
        }
        let outcome = if ctrl_seq > self.last_rcv_ctl_seq + 1 {
            ControlRcvOutcome::Gap
        } else {
            ControlRcvOutcome::InOrder
        };
        self.last_rcv_ctl_seq = ctrl_seq;
        outcome
    }

    /// ACK branch of receive dispatch: feeds the RTT estimator and
    /// cumulatively clears the retransmission queue.
    pub fn on_ack(&mut self, acked_seq: u64, now: Instant) {
        if let Some(rtx) = self.retransmission.as_mut() {
            for entry in rtx.ack(acked_seq) {
                self.rtt.sample(now.duration_since(entry.first_send_time));
            }
            if rtx.is_empty() {
                self.r_timer.cancel();
            }
        }
        self.rearm_tr_timer();
        self.rearm_rendezvous_timer();
    }

    /// NACK branch: requests retransmission of every PDU at/after `seq`.
    pub fn on_nack(&mut self, seq: u64, now: Instant) -> (Vec<Vec<u8>>, bool) {
        let outcome = match self.retransmission.as_mut() {
            Some(rtx) => rtx.nack(seq, now),
            None => (Vec::new(), false),
        };
        self.rearm_tr_timer();
        outcome
    }

    /// Called by the owner once the tr-timer fires: retries the oldest
    /// unacknowledged entry (as a self-NACK against its own sequence
    /// number) and rearms for the next one, mirroring a NACK arriving
    /// from the peer but driven by local timeout instead.
    pub fn on_tr_timeout(&mut self, now: Instant) -> (Vec<Vec<u8>>, bool) {
        let oldest = self
            .retransmission
            .as_ref()
            .and_then(|rtx| rtx.entries.front())
            .map(|entry| entry.sequence_number);
        let outcome = match oldest {
            Some(seq) => self
                .retransmission
                .as_mut()
                .map(|rtx| rtx.nack(seq, now))
                .unwrap_or_default(),
            None => (Vec::new(), false),
        };
        self.rearm_tr_timer();
        outcome
    }

    /// FC branch: advances the sender's window and/or rate, then drains
    /// as many closed-window-queued PDUs as the new credit allows.
    pub fn on_flow_control(&mut self, new_rwe: u64) -> Vec<Vec<u8>> {
        let released = if let Some(window) = self.window.as_mut() {
            let before = window.send_right_we;
            window.advance_send_window(new_rwe);
            (window.send_right_we - before) as usize
        } else {
            usize::MAX
        };
        let drained = self.closed_window_queue.drain(released);
        self.rearm_rendezvous_timer();
        drained
    }

    /// Receiver-side rendezvous (`default_rcvr_rendezvous`): a RENDEZVOUS
    /// PDU arrived from the peer. Unlike the sender's idle-triggered
    /// timer, the receiver rearms unconditionally so it keeps resending
    /// its own flow-control state back at `rendezvous_ms` intervals for
    /// as long as the peer keeps polling.
    pub fn on_rendezvous(&mut self) {
        if let (Some(duration), Some(sink)) = (self.rendezvous_duration, self.rendezvous_sink.as_ref()) {
            self.rendezvous_timer.arm(duration, sink.clone());
        }
    }
}

/// Outcome of [`Dtcp::common_rcv_control`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlRcvOutcome {
    InOrder,
    Duplicate,
    Gap,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_checked_before_window_when_both_active() {
        let mut dtcp = Dtcp::new(
            Some(WindowFlowControl::new(100)),
            Some(RateFlowControl::new(Duration::from_secs(1), 1, Instant::now())),
            None,
            10,
        );
        let now = Instant::now();
        assert!(dtcp.window_open(0, now));
        dtcp.register_sent(0, vec![], now);
        // Window still wide open (100 credit) but rate is now exhausted.
        assert!(!dtcp.window_open(1, now));
    }

    #[test]
    fn ack_cumulativity_clears_queue_up_to_s() {
        let mut rtx = RetransmissionQueue::new(3);
        let t0 = Instant::now();
        rtx.push(1, vec![1], t0);
        rtx.push(2, vec![2], t0);
        rtx.push(3, vec![3], t0);
        rtx.ack(2);
        assert_eq!(rtx.len(), 1);
        assert_eq!(rtx.entries.front().unwrap().sequence_number, 3);
    }

    #[test]
    fn nack_retransmits_and_eventually_breaks() {
        let mut rtx = RetransmissionQueue::new(2);
        let t0 = Instant::now();
        rtx.push(5, vec![0xAB], t0);
        let (resend, broken) = rtx.nack(5, t0);
        assert_eq!(resend, vec![vec![0xAB]]);
        assert!(!broken);
        let (_, broken) = rtx.nack(5, t0);
        assert!(!broken);
        let (_, broken) = rtx.nack(5, t0);
        assert!(broken);
    }

    #[test]
    fn closed_window_queue_releases_exact_credit() {
        let mut cwq = ClosedWindowQueue::new(10);
        for i in 0..6u8 {
            cwq.push(vec![i]).unwrap();
        }
        let released = cwq.drain(3);
        assert_eq!(released.len(), 3);
        assert_eq!(cwq.len(), 3);
    }

    #[test]
    fn common_rcv_control_detects_duplicate_and_gap() {
        let mut dtcp = Dtcp::new(None, None, None, 10);
        assert_eq!(dtcp.common_rcv_control(1), ControlRcvOutcome::InOrder);
        assert_eq!(dtcp.common_rcv_control(1), ControlRcvOutcome::Duplicate);
        assert_eq!(dtcp.common_rcv_control(5), ControlRcvOutcome::Gap);
    }

    #[tokio::test]
    async fn r_timer_fires_when_queue_stays_unacked() {
        let mut dtcp = Dtcp::new(None, None, Some(RetransmissionQueue::new(0)), 10);
        let (tx, mut rx) = mpsc::channel(1);
        dtcp.set_r_timer_sink(tx);
        dtcp.rtt.srtt = Duration::from_millis(1);
        dtcp.rtt.rttvar = Duration::ZERO;
        let now = Instant::now();
        dtcp.register_sent(0, vec![1], now);
        rx.recv().await.expect("r-timer should fire on an unacked PDU");
    }

    #[tokio::test]
    async fn r_timer_cancelled_once_queue_drains() {
        let mut dtcp = Dtcp::new(None, None, Some(RetransmissionQueue::new(0)), 10);
        let (tx, mut rx) = mpsc::channel(1);
        dtcp.set_r_timer_sink(tx);
        dtcp.rtt.srtt = Duration::from_millis(5);
        dtcp.rtt.rttvar = Duration::ZERO;
        let now = Instant::now();
        dtcp.register_sent(0, vec![1], now);
        dtcp.on_ack(0, now);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(rx.try_recv().is_err(), "acking the only entry should cancel the r-timer");
    }

    #[tokio::test]
    async fn tr_timer_fires_and_yields_the_oldest_unacked_entry() {
        let mut dtcp = Dtcp::new(None, None, Some(RetransmissionQueue::new(3)), 10);
        let (tx, mut rx) = mpsc::channel(1);
        dtcp.configure_tr_timer(Duration::from_millis(5), tx);
        let now = Instant::now();
        dtcp.register_sent(7, vec![0xAA], now);
        rx.recv().await.expect("tr-timer should fire for the unacked entry");
        let (resent, broken) = dtcp.on_tr_timeout(Instant::now());
        assert_eq!(resent, vec![vec![0xAA]]);
        assert!(!broken);
    }

    #[tokio::test]
    async fn tr_timer_cancelled_once_the_entry_is_acked() {
        let mut dtcp = Dtcp::new(None, None, Some(RetransmissionQueue::new(3)), 10);
        let (tx, mut rx) = mpsc::channel(1);
        dtcp.configure_tr_timer(Duration::from_millis(10), tx);
        let now = Instant::now();
        dtcp.register_sent(1, vec![1], now);
        dtcp.on_ack(1, now);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err(), "acking the entry should cancel the tr-timer");
    }

    #[tokio::test]
    async fn rendezvous_timer_fires_after_idle_send() {
        let mut dtcp = Dtcp::new(
            Some(WindowFlowControl::new(10)),
            None,
            Some(RetransmissionQueue::new(3)),
            10,
        );
        let (tx, mut rx) = mpsc::channel(1);
        dtcp.configure_rendezvous_timer(Duration::from_millis(5), tx);
        let now = Instant::now();
        dtcp.register_sent(0, vec![1], now);
        dtcp.on_ack(0, now);
        rx.recv()
            .await
            .expect("rendezvous timer should fire once nothing is outstanding or queued");
    }

    #[tokio::test]
    async fn rendezvous_timer_stays_cancelled_while_retransmissions_are_outstanding() {
        let mut dtcp = Dtcp::new(None, None, Some(RetransmissionQueue::new(3)), 10);
        let (tx, mut rx) = mpsc::channel(1);
        dtcp.configure_rendezvous_timer(Duration::from_millis(5), tx);
        let now = Instant::now();
        dtcp.register_sent(0, vec![1], now);
        tokio::time::sleep(Duration::from_millis(15)).await;
        assert!(
            rx.try_recv().is_err(),
            "an outstanding unacked entry should suppress rendezvous"
        );
    }

    #[tokio::test]
    async fn receiver_rendezvous_rearms_unconditionally() {
        let mut dtcp = Dtcp::new(None, None, Some(RetransmissionQueue::new(3)), 10);
        let now = Instant::now();
        dtcp.register_sent(0, vec![1], now);
        let (tx, mut rx) = mpsc::channel(1);
        dtcp.configure_rendezvous_timer(Duration::from_millis(5), tx);
        dtcp.on_rendezvous();
        rx.recv()
            .await
            .expect("receiver rendezvous should rearm even with entries outstanding");
    }
}
