//! `reorder`: buffers out-of-order tokens from `listen` and re-emits them
//! in strict ascending order (spec §4.2, scenario S6). A task coroutine:
//! it needs to hold back tokens that arrived early, which `walk`'s
//! immediate get-then-put loop can't express.

use std::collections::BTreeSet;

use taketake_common::TaketakeError;
use taketake_stepnet::{StepperHandle, Token};
use tracing::trace;

pub async fn run(handle: &mut StepperHandle) -> Result<(), TaketakeError> {
    let mut pending: BTreeSet<u64> = BTreeSet::new();
    let mut next_expected: u64 = 0;

    loop {
        let token = handle.get().await?;
        if token.is_end() {
            break;
        }
        let index = token.index().expect("non-end token always has an index");
        pending.insert(index as u64);

        while pending.remove(&next_expected) {
            trace!(index = next_expected, "reorder emitting in order");
            handle.put(Token::new(next_expected))?;
            next_expected += 1;
        }
    }

    debug_assert!(pending.is_empty(), "reorder saw the end-token with gaps still pending");
    handle.put(Token::END)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use taketake_stepnet::NetworkBuilder;

    #[tokio::test]
    async fn emits_out_of_order_input_in_ascending_order() {
        let mut builder = NetworkBuilder::new();
        let q_in = builder.data_queue("in");
        let q_out = builder.data_queue("out");
        let feed_id = builder.add("feed", &[], &[q_in], &[], &[]).unwrap();
        let reorder_id = builder
            .add("reorder", &[q_in], &[q_out], &[], &[])
            .unwrap();
        let sink_id = builder.add("sink", &[q_out], &[], &[], &[]).unwrap();
        let mut net = builder.build().unwrap();

        let mut feed = taketake_stepnet::StepperHandle::new(&mut net, feed_id);
        let mut reorder_handle = taketake_stepnet::StepperHandle::new(&mut net, reorder_id);
        let mut sink = taketake_stepnet::StepperHandle::new(&mut net, sink_id);

        let feeder = tokio::spawn(async move {
            for i in [2u64, 0, 3, 1] {
                feed.put(Token::new(i)).unwrap();
            }
            feed.put(Token::END).unwrap();
        });
        let reorderer = tokio::spawn(async move {
            run(&mut reorder_handle).await.unwrap();
        });

        let mut seen = Vec::new();
        loop {
            let t = sink.get().await.unwrap();
            let end = t.is_end();
            seen.push(t);
            if end {
                break;
            }
        }

        feeder.await.unwrap();
        reorderer.await.unwrap();
        assert_eq!(
            seen,
            vec![
                Token::new(0),
                Token::new(1),
                Token::new(2),
                Token::new(3),
                Token::END,
            ]
        );
    }
}
