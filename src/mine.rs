use std::fmt;
use std::sync::Arc;

use md5::{Digest, Md5};
use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::TaskError;
use crate::pool::{self, Outcome};

/// Number of decimal digits in a candidate token.
pub const TOKEN_LEN: usize = 50;

/// Length of a hex-encoded MD5 digest.
const DIGEST_LEN: usize = 32;

/// Find a token whose digest ends in `suffix_len` zero characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MineTask {
    pub suffix_len: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mined {
    pub token: String,
    pub digest: String,
}

impl fmt::Display for Mined {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.token, self.digest)
    }
}

/// `count` identical searches for the same suffix length.
pub fn batch(count: usize, suffix_len: usize) -> Vec<MineTask> {
    vec![MineTask { suffix_len }; count]
}

/// One search per requested suffix length.
pub fn batch_for_lengths(lengths: &[usize]) -> Vec<MineTask> {
    lengths
        .iter()
        .map(|&suffix_len| MineTask { suffix_len })
        .collect()
}

pub fn digest(token: &str) -> String {
    hex::encode(Md5::digest(token.as_bytes()))
}

pub fn meets_target(digest: &str, suffix_len: usize) -> bool {
    digest.len() >= suffix_len && digest.bytes().rev().take(suffix_len).all(|b| b == b'0')
}

pub fn random_token<R: Rng>(rng: &mut R) -> String {
    (0..TOKEN_LEN)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

/// Brute-force search. Spins until a match is found or `cancel` fires;
/// the token is checked once per attempt.
pub fn search(suffix_len: usize, cancel: &CancellationToken) -> Outcome<Mined> {
    if suffix_len > DIGEST_LEN {
        return Err(TaskError::Construction(format!(
            "suffix length {suffix_len} exceeds digest length {DIGEST_LEN}"
        )));
    }

    let mut rng = rand::thread_rng();
    let mut attempts: u64 = 0;
    loop {
        if cancel.is_cancelled() {
            debug!(attempts, suffix_len, "search cancelled");
            return Err(TaskError::Cancelled);
        }
        attempts += 1;

        let token = random_token(&mut rng);
        let digest = digest(&token);
        if meets_target(&digest, suffix_len) {
            debug!(attempts, suffix_len, "match found");
            return Ok(Mined { token, digest });
        }
    }
}

/// Pool worker: runs [`search`] on a blocking thread so it never stalls
/// the async workers.
pub async fn mine_suffix(task: Arc<MineTask>, cancel: CancellationToken) -> Outcome<Mined> {
    let suffix_len = task.suffix_len;
    tokio::task::spawn_blocking(move || search(suffix_len, &cancel))
        .await
        .unwrap_or_else(|err| Err(pool::join_failure(err)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use std::time::Duration;

    #[test]
    fn digest_is_hex_md5() {
        assert_eq!(digest(""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(digest("abc"), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn target_checks_trailing_zeros() {
        assert!(meets_target("abc000", 3));
        assert!(meets_target("abc000", 0));
        assert!(!meets_target("abc000", 4));
        assert!(!meets_target("a0b0", 2));
        assert!(!meets_target("00", 3));
    }

    #[test]
    fn tokens_are_decimal_digits() {
        let mut rng = rand::thread_rng();
        let token = random_token(&mut rng);
        assert_eq!(token.len(), TOKEN_LEN);
        assert!(token.bytes().all(|b| b.is_ascii_digit()));
    }

    #[test]
    fn batches() {
        assert_eq!(batch(4, 5), vec![MineTask { suffix_len: 5 }; 4]);
        assert!(batch(0, 5).is_empty());

        let tasks = batch_for_lengths(&[1, 2, 3]);
        let lengths: Vec<usize> = tasks.iter().map(|t| t.suffix_len).collect();
        assert_eq!(lengths, vec![1, 2, 3]);
    }

    #[test]
    fn impossible_suffix_is_rejected() {
        let cancel = CancellationToken::new();
        let err = search(DIGEST_LEN + 1, &cancel).unwrap_err();
        assert_eq!(err.kind(), FailureKind::Construction);
    }

    #[test]
    fn search_stops_when_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert_eq!(search(DIGEST_LEN, &cancel), Err(TaskError::Cancelled));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn four_searches_on_two_workers() {
        let config = pool::config(2, None).unwrap();
        let completions = pool::spawn(&config, batch(4, 1), mine_suffix).collect().await;

        assert_eq!(completions.len(), 4);
        for completion in completions {
            let mined = completion.outcome.unwrap();
            assert_eq!(digest(&mined.token), mined.digest);
            assert!(mined.digest.ends_with('0'));
            assert_eq!(mined.to_string(), format!("{} {}", mined.token, mined.digest));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn deadline_interrupts_unbounded_search() {
        let config = pool::config(2, Some(Duration::from_millis(100))).unwrap();
        let completions = tokio::time::timeout(
            Duration::from_secs(5),
            pool::spawn(&config, batch(3, DIGEST_LEN), mine_suffix).collect(),
        )
        .await
        .expect("deadline should stop the search");

        assert_eq!(completions.len(), 3);
        assert!(
            completions
                .iter()
                .all(|c| c.outcome == Err(TaskError::Cancelled))
        );
    }
}
