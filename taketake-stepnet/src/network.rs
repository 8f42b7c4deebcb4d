use tokio::sync::mpsc;
use tracing::trace;

use taketake_common::TaketakeError;

use crate::token::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueueId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StepId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    /// Carries only the end-token: a barrier.
    Sync,
    /// Carries per-item tokens followed by the end-token.
    Data,
}

pub(crate) struct QueueSlot {
    pub name: String,
    pub kind: QueueKind,
    pub sender: mpsc::UnboundedSender<Token>,
    pub receiver: Option<mpsc::UnboundedReceiver<Token>>,
    pub producer: Option<StepId>,
    pub consumer: Option<StepId>,
}

struct StepDescriptor {
    name: String,
    pull_from: Vec<QueueId>,
    send_to: Vec<QueueId>,
    sync_from: Vec<QueueId>,
    sync_to: Vec<QueueId>,
}

/// Arena of queue descriptors and stepper descriptors, indexed by integer
/// identifiers rather than the original's function-identity back-references
/// (spec §9's design note on cyclic back-references).
#[derive(Default)]
pub struct NetworkBuilder {
    queues: Vec<QueueSlot>,
    steps: Vec<StepDescriptor>,
}

impl NetworkBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn new_queue(&mut self, name: impl Into<String>, kind: QueueKind) -> QueueId {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = QueueId(self.queues.len());
        self.queues.push(QueueSlot {
            name: name.into(),
            kind,
            sender: tx,
            receiver: Some(rx),
            producer: None,
            consumer: None,
        });
        id
    }

    pub fn data_queue(&mut self, name: impl Into<String>) -> QueueId {
        self.new_queue(name, QueueKind::Data)
    }

    pub fn sync_queue(&mut self, name: impl Into<String>) -> QueueId {
        self.new_queue(name, QueueKind::Sync)
    }

    /// Register a step. `pull_from`/`send_to` carry per-token data;
    /// `sync_from`/`sync_to` carry only the barrier end-token.
    pub fn add(
        &mut self,
        name: impl Into<String>,
        pull_from: &[QueueId],
        send_to: &[QueueId],
        sync_from: &[QueueId],
        sync_to: &[QueueId],
    ) -> Result<StepId, TaketakeError> {
        let name = name.into();
        let id = StepId(self.steps.len());

        for &q in pull_from {
            self.claim_consumer(q, id, &name, QueueKind::Data)?;
        }
        for &q in send_to {
            self.claim_producer(q, id, &name, QueueKind::Data)?;
        }
        for &q in sync_from {
            self.claim_consumer(q, id, &name, QueueKind::Sync)?;
        }
        for &q in sync_to {
            self.claim_producer(q, id, &name, QueueKind::Sync)?;
        }

        self.steps.push(StepDescriptor {
            name,
            pull_from: pull_from.to_vec(),
            send_to: send_to.to_vec(),
            sync_from: sync_from.to_vec(),
            sync_to: sync_to.to_vec(),
        });
        Ok(id)
    }

    /// Auto-link consecutive steps `a, b, c, ...` with fresh token queues,
    /// applying `pull_from`/`sync_from` to the first step and
    /// `send_to`/`sync_to` to the last (spec §4.1's `add_pipeline`).
    #[allow(clippy::too_many_arguments)]
    pub fn add_pipeline(
        &mut self,
        names: &[&str],
        outer_pull_from: &[QueueId],
        outer_send_to: &[QueueId],
        outer_sync_from: &[QueueId],
        outer_sync_to: &[QueueId],
    ) -> Result<Vec<StepId>, TaketakeError> {
        assert!(names.len() >= 1, "pipeline needs at least one step");
        let mut ids = Vec::with_capacity(names.len());
        let mut prev_queue: Option<QueueId> = None;
        for (i, name) in names.iter().enumerate() {
            let is_first = i == 0;
            let is_last = i == names.len() - 1;

            let pull_from: Vec<QueueId> = if is_first {
                outer_pull_from.to_vec()
            } else {
                vec![prev_queue.expect("interior pipeline link")]
            };
            let sync_from: Vec<QueueId> = if is_first {
                outer_sync_from.to_vec()
            } else {
                Vec::new()
            };

            let next_queue = if !is_last {
                Some(self.data_queue(format!("{name}->{}", names[i + 1])))
            } else {
                None
            };
            let send_to: Vec<QueueId> = if is_last {
                outer_send_to.to_vec()
            } else {
                vec![next_queue.unwrap()]
            };
            let sync_to: Vec<QueueId> = if is_last {
                outer_sync_to.to_vec()
            } else {
                Vec::new()
            };

            let id = self.add(*name, &pull_from, &send_to, &sync_from, &sync_to)?;
            ids.push(id);
            prev_queue = next_queue;
        }
        Ok(ids)
    }

    fn claim_producer(
        &mut self,
        q: QueueId,
        step: StepId,
        step_name: &str,
        expect_kind: QueueKind,
    ) -> Result<(), TaketakeError> {
        let slot = &mut self.queues[q.0];
        if slot.kind != expect_kind {
            return Err(TaketakeError::NetworkWiring(format!(
                "queue `{}` kind mismatch: expected {:?}, got {:?}",
                slot.name, expect_kind, slot.kind
            )));
        }
        if let Some(existing) = slot.producer {
            return Err(TaketakeError::NetworkWiring(format!(
                "queue `{}` already has a producer ({:?}), cannot add `{}`",
                slot.name, existing, step_name
            )));
        }
        slot.producer = Some(step);
        Ok(())
    }

    fn claim_consumer(
        &mut self,
        q: QueueId,
        step: StepId,
        step_name: &str,
        expect_kind: QueueKind,
    ) -> Result<(), TaketakeError> {
        let slot = &mut self.queues[q.0];
        if slot.kind != expect_kind {
            return Err(TaketakeError::NetworkWiring(format!(
                "queue `{}` kind mismatch: expected {:?}, got {:?}",
                slot.name, expect_kind, slot.kind
            )));
        }
        if let Some(existing) = slot.consumer {
            return Err(TaketakeError::NetworkWiring(format!(
                "queue `{}` already has a consumer ({:?}), cannot add `{}`",
                slot.name, existing, step_name
            )));
        }
        slot.consumer = Some(step);
        Ok(())
    }

    /// Validate the wiring contract (spec §4.1) and return the driveable
    /// network: every queue claimed on both ends, no self-loops, and the
    /// union graph of sync+token edges acyclic.
    pub fn build(mut self) -> Result<Network, TaketakeError> {
        for slot in &self.queues {
            if slot.producer.is_none() || slot.consumer.is_none() {
                return Err(TaketakeError::NetworkWiring(format!(
                    "queue `{}` has an unclaimed end (producer={:?}, consumer={:?})",
                    slot.name, slot.producer, slot.consumer
                )));
            }
            if let (Some(p), Some(c)) = (slot.producer, slot.consumer) {
                if p == c {
                    return Err(TaketakeError::NetworkWiring(format!(
                        "queue `{}` is a self-loop on step {:?}",
                        slot.name, p
                    )));
                }
            }
        }

        self.check_acyclic()?;

        trace!(steps = self.steps.len(), queues = self.queues.len(), "network validated");
        Ok(Network {
            queues: self.queues,
            steps: self.steps,
        })
    }

    fn check_acyclic(&self) -> Result<(), TaketakeError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Color {
            White,
            Gray,
            Black,
        }

        let n = self.steps.len();
        let mut adj: Vec<Vec<usize>> = vec![Vec::new(); n];
        for slot in &self.queues {
            if let (Some(p), Some(c)) = (slot.producer, slot.consumer) {
                adj[p.0].push(c.0);
            }
        }

        let mut color = vec![Color::White; n];
        let mut path: Vec<usize> = Vec::new();

        fn visit(
            u: usize,
            adj: &[Vec<usize>],
            color: &mut [Color],
            path: &mut Vec<usize>,
            names: &[StepDescriptor],
        ) -> Result<(), TaketakeError> {
            color[u] = Color::Gray;
            path.push(u);
            for &v in &adj[u] {
                match color[v] {
                    Color::White => visit(v, adj, color, path, names)?,
                    Color::Gray => {
                        let cycle_start = path.iter().position(|&x| x == v).unwrap();
                        let cycle: Vec<&str> = path[cycle_start..]
                            .iter()
                            .map(|&i| names[i].name.as_str())
                            .collect();
                        return Err(TaketakeError::NetworkWiring(format!(
                            "cycle detected: {} -> {}",
                            cycle.join(" -> "),
                            names[v].name
                        )));
                    }
                    Color::Black => {}
                }
            }
            path.pop();
            color[u] = Color::Black;
            Ok(())
        }

        for u in 0..n {
            if color[u] == Color::White {
                visit(u, &adj, &mut color, &mut path, &self.steps)?;
            }
        }
        Ok(())
    }
}

/// A validated, driveable network. Steppers are taken out by name/id once;
/// taking the same step twice panics (programming error, not runtime).
pub struct Network {
    pub(crate) queues: Vec<QueueSlot>,
    steps: Vec<StepDescriptor>,
}

impl Network {
    pub(crate) fn descriptor(&self, id: StepId) -> (&str, &[QueueId], &[QueueId], &[QueueId], &[QueueId]) {
        let d = &self.steps[id.0];
        (&d.name, &d.pull_from, &d.send_to, &d.sync_from, &d.sync_to)
    }

    pub(crate) fn sender(&self, q: QueueId) -> mpsc::UnboundedSender<Token> {
        self.queues[q.0].sender.clone()
    }

    pub(crate) fn take_receiver(&mut self, q: QueueId) -> mpsc::UnboundedReceiver<Token> {
        self.queues[q.0]
            .receiver
            .take()
            .expect("receiver already taken for this queue")
    }

    pub fn step_ids(&self) -> Vec<StepId> {
        (0..self.steps.len()).map(StepId).collect()
    }

    pub fn step_name(&self, id: StepId) -> &str {
        &self.steps[id.0].name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_a_simple_pipeline() {
        let mut b = NetworkBuilder::new();
        let ids = b
            .add_pipeline(&["a", "b", "c"], &[], &[], &[], &[])
            .unwrap();
        assert_eq!(ids.len(), 3);
        b.build().unwrap();
    }

    #[test]
    fn rejects_unclaimed_queue_end() {
        let mut b = NetworkBuilder::new();
        let q = b.data_queue("orphan");
        b.add("producer", &[], &[q], &[], &[]).unwrap();
        let err = b.build().unwrap_err();
        assert!(matches!(err, TaketakeError::NetworkWiring(_)));
    }

    #[test]
    fn rejects_cycle() {
        let mut b = NetworkBuilder::new();
        let q1 = b.data_queue("a->b");
        let q2 = b.data_queue("b->a");
        b.add("a", &[q2], &[q1], &[], &[]).unwrap();
        b.add("b", &[q1], &[q2], &[], &[]).unwrap();
        let err = b.build().unwrap_err();
        match err {
            TaketakeError::NetworkWiring(msg) => assert!(msg.contains("cycle")),
            other => panic!("expected wiring error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_self_loop() {
        let mut b = NetworkBuilder::new();
        let q = b.data_queue("self");
        b.add("lonely", &[q], &[q], &[], &[]).unwrap();
        let err = b.build().unwrap_err();
        match err {
            TaketakeError::NetworkWiring(msg) => assert!(msg.contains("self-loop")),
            other => panic!("expected wiring error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_double_producer() {
        let mut b = NetworkBuilder::new();
        let q = b.data_queue("shared");
        b.add("first", &[], &[q], &[], &[]).unwrap();
        let err = b.add("second", &[], &[q], &[], &[]).unwrap_err();
        assert!(matches!(err, TaketakeError::NetworkWiring(_)));
    }
}
