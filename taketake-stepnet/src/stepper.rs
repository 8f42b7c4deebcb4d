use std::collections::HashSet;
use std::future::Future;
use std::task::Poll;

use tokio::sync::mpsc;
use tracing::trace;

use taketake_common::TaketakeError;

use crate::network::{Network, QueueId, StepId};
use crate::token::Token;

/// The four queue-sets owned by a stepper, plus the bookkeeping for the
/// cross-queue synchronization algorithm (spec §4.1).
pub struct StepperHandle {
    name: String,
    pull_from: Vec<QueueId>,
    pull_receivers: Vec<mpsc::UnboundedReceiver<Token>>,
    pending: Vec<HashSet<Token>>,
    finished: Vec<bool>,

    sync_from: Vec<mpsc::UnboundedReceiver<Token>>,
    sync_from_names: Vec<String>,

    send_to: Vec<mpsc::UnboundedSender<Token>>,
    sync_to: Vec<mpsc::UnboundedSender<Token>>,
}

impl StepperHandle {
    /// Pull the steppers's queues out of `net` by step id. Each queue's
    /// receiving half may only be taken once across the whole network.
    pub fn new(net: &mut Network, id: StepId) -> Self {
        let (name, pull_from, send_to, sync_from, sync_to) = {
            let (name, pull_from, send_to, sync_from, sync_to) = net.descriptor(id);
            (
                name.to_string(),
                pull_from.to_vec(),
                send_to.to_vec(),
                sync_from.to_vec(),
                sync_to.to_vec(),
            )
        };

        let k = pull_from.len();
        let pull_receivers = pull_from.iter().map(|&q| net.take_receiver(q)).collect();
        let sync_from_receivers: Vec<_> = sync_from.iter().map(|&q| net.take_receiver(q)).collect();
        let sync_from_names: Vec<String> = sync_from
            .iter()
            .map(|&q| net.queues[q.0].name.clone())
            .collect();

        Self {
            name,
            pull_from,
            pull_receivers,
            pending: vec![HashSet::new(); k],
            finished: vec![false; k],
            sync_from: sync_from_receivers,
            sync_from_names,
            send_to: send_to.iter().map(|&q| net.sender(q)).collect(),
            sync_to: sync_to.iter().map(|&q| net.sender(q)).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Drain `sync_from`: every incoming sync queue must produce exactly
    /// the end-token before the stepper's first `get`.
    pub async fn presync(&mut self) -> Result<(), TaketakeError> {
        for (rx, qname) in self.sync_from.iter_mut().zip(self.sync_from_names.iter()) {
            let token = rx.recv().await.unwrap_or(Token::END);
            if token != Token::END {
                return Err(TaketakeError::PreSyncTokenError {
                    step: self.name.clone(),
                    queue: qname.clone(),
                    token: token_debug(token),
                });
            }
        }
        Ok(())
    }

    /// Deliver the next token only once it has appeared on every
    /// `pull_from` queue (spec §4.1's cross-queue synchronization
    /// algorithm). Returns `Token::END` exactly once, after which the
    /// stepper's pull phase is over.
    pub async fn get(&mut self) -> Result<Token, TaketakeError> {
        if self.pull_from.is_empty() {
            return Ok(Token::END);
        }
        loop {
            if self.finished.iter().all(|&f| f) {
                let desynced = self
                    .pending
                    .iter()
                    .any(|set| set.len() != 1 || !set.contains(&Token::END));
                if desynced {
                    let extra: Vec<String> = self
                        .pending
                        .iter()
                        .enumerate()
                        .map(|(j, s)| {
                            let mut toks: Vec<Token> =
                                s.iter().copied().filter(|t| *t != Token::END).collect();
                            toks.sort();
                            format!(
                                "{}: [{}]",
                                queue_label(&self.pull_from, j),
                                toks.iter()
                                    .map(|t| t.to_string())
                                    .collect::<Vec<_>>()
                                    .join(",")
                            )
                        })
                        .collect();
                    return Err(TaketakeError::DesynchronizationError {
                        step: self.name.clone(),
                        extra: extra.join("; "),
                    });
                }
                for set in self.pending.iter_mut() {
                    set.remove(&Token::END);
                }
                return Ok(Token::END);
            }

            if let Some(tok) = self.try_pop_intersection() {
                return Ok(tok);
            }

            self.await_next_arrival().await?;
        }
    }

    fn try_pop_intersection(&mut self) -> Option<Token> {
        if self.pending.iter().any(|s| s.is_empty()) {
            return None;
        }
        let mut intersection: HashSet<Token> = self.pending[0].clone();
        for set in &self.pending[1..] {
            intersection.retain(|t| set.contains(t));
            if intersection.is_empty() {
                return None;
            }
        }
        if intersection.is_empty() {
            return None;
        }
        let chosen = intersection
            .iter()
            .copied()
            .find(|t| !t.is_end())
            .unwrap_or(Token::END);
        for set in self.pending.iter_mut() {
            set.remove(&chosen);
        }
        Some(chosen)
    }

    async fn await_next_arrival(&mut self) -> Result<(), TaketakeError> {
        let pending = &mut self.pending;
        let finished = &mut self.finished;
        let receivers = &mut self.pull_receivers;
        let (i, token) = std::future::poll_fn(|cx| {
            for i in 0..receivers.len() {
                if finished[i] {
                    continue;
                }
                if let Poll::Ready(v) = receivers[i].poll_recv(cx) {
                    return Poll::Ready((i, v));
                }
            }
            Poll::Pending
        })
        .await;

        match token {
            Some(tok) => {
                if pending[i].contains(&tok) {
                    return Err(TaketakeError::DuplicateTokenError {
                        step: self.name.clone(),
                        queue: queue_label(&self.pull_from, i),
                        token: token_debug(tok),
                    });
                }
                pending[i].insert(tok);
                if tok.is_end() {
                    finished[i] = true;
                }
                trace!(step = %self.name, queue = i, token = %tok, "token arrived");
            }
            None => {
                finished[i] = true;
            }
        }
        Ok(())
    }

    /// Put `t` on every `send_to` queue; if `t` is the end-token, also put
    /// it on every `sync_to` queue (spec §4.1's emission rule).
    pub fn put(&self, t: Token) -> Result<(), TaketakeError> {
        for tx in &self.send_to {
            let _ = tx.send(t);
        }
        if t.is_end() {
            for tx in &self.sync_to {
                let _ = tx.send(Token::END);
            }
        }
        Ok(())
    }
}

fn queue_label(ids: &[QueueId], i: usize) -> String {
    format!("pull_from[{}]={:?}", i, ids[i])
}

fn token_debug(t: Token) -> u64 {
    if t.is_end() {
        u64::MAX
    } else {
        t.index().unwrap() as u64
    }
}

/// Drive a stepped coroutine: one invocation of `coro` per received token,
/// bracketed by `get`/`put`. `coro` sees `Token::END` exactly once, after
/// which `walk` returns.
pub async fn walk<F, Fut>(handle: &mut StepperHandle, mut coro: F) -> Result<(), TaketakeError>
where
    F: FnMut(Token) -> Fut,
    Fut: Future<Output = Result<(), TaketakeError>>,
{
    assert!(
        !handle.pull_from.is_empty(),
        "stepped coroutine `{}` must have at least one pull_from",
        handle.name
    );
    handle.presync().await?;
    loop {
        let token = handle.get().await?;
        let is_end = token.is_end();
        coro(token).await?;
        handle.put(token)?;
        if is_end {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::NetworkBuilder;

    #[tokio::test]
    async fn delivers_token_only_once_on_every_pull_from() {
        let mut b = NetworkBuilder::new();
        let qa = b.data_queue("a");
        let qb = b.data_queue("b");
        let consumer = b.add("consumer", &[qa, qb], &[], &[], &[]).unwrap();
        b.add("noop-a", &[], &[qa], &[], &[]).unwrap();
        b.add("noop-b", &[], &[qb], &[], &[]).unwrap();
        let mut net = b.build().unwrap();

        let mut handle = StepperHandle::new(&mut net, consumer);

        let tx_a = net.sender(qa);
        let tx_b = net.sender(qb);

        // Deliver out of order on each queue; get() must only release a
        // token once it's present on both.
        tx_a.send(Token::new(2)).unwrap();
        tx_a.send(Token::new(0)).unwrap();
        tx_b.send(Token::new(0)).unwrap();

        let first = handle.get().await.unwrap();
        assert_eq!(first, Token::new(0));

        tx_b.send(Token::new(2)).unwrap();
        let second = handle.get().await.unwrap();
        assert_eq!(second, Token::new(2));

        tx_a.send(Token::END).unwrap();
        tx_b.send(Token::END).unwrap();
        let third = handle.get().await.unwrap();
        assert!(third.is_end());
    }

    #[tokio::test]
    async fn duplicate_token_is_an_error() {
        let mut b = NetworkBuilder::new();
        let qa = b.data_queue("a");
        let consumer = b.add("consumer", &[qa], &[], &[], &[]).unwrap();
        b.add("noop-a", &[], &[qa], &[], &[]).unwrap();
        let mut net = b.build().unwrap();
        let mut handle = StepperHandle::new(&mut net, consumer);

        let tx_a = net.sender(qa);
        tx_a.send(Token::new(0)).unwrap();
        tx_a.send(Token::new(0)).unwrap();

        let err = handle.get().await.unwrap_err();
        assert!(matches!(err, TaketakeError::DuplicateTokenError { .. }));
    }

    #[tokio::test]
    async fn desync_when_queues_disagree_at_end() {
        let mut b = NetworkBuilder::new();
        let qa = b.data_queue("a");
        let qb = b.data_queue("b");
        let consumer = b.add("consumer", &[qa, qb], &[], &[], &[]).unwrap();
        b.add("noop-a", &[], &[qa], &[], &[]).unwrap();
        b.add("noop-b", &[], &[qb], &[], &[]).unwrap();
        let mut net = b.build().unwrap();
        let mut handle = StepperHandle::new(&mut net, consumer);

        let tx_a = net.sender(qa);
        let tx_b = net.sender(qb);

        // `a` produces token 0 that `b` never produces, then both end.
        tx_a.send(Token::new(0)).unwrap();
        tx_a.send(Token::END).unwrap();
        tx_b.send(Token::END).unwrap();

        let err = handle.get().await.unwrap_err();
        assert!(matches!(err, TaketakeError::DesynchronizationError { .. }));
    }

    #[tokio::test]
    async fn presync_requires_exactly_end_token() {
        let mut b = NetworkBuilder::new();
        let s = b.sync_queue("barrier");
        let consumer = b.add("consumer", &[], &[], &[s], &[]).unwrap();
        b.add("noop", &[], &[], &[], &[s]).unwrap();
        let mut net = b.build().unwrap();
        let mut handle = StepperHandle::new(&mut net, consumer);
        let tx = net.sender(s);
        tx.send(Token::END).unwrap();
        handle.presync().await.unwrap();
    }
}
