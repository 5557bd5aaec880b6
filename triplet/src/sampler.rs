use rand::seq::index;
use rand::Rng;

use crate::corpus::{CorpusIndex, UtteranceRecord};
use crate::error::TripletError;

/// Anchor, positive and negative utterances for triplet loss.
///
/// Anchor and positive come from the same speaker and are distinct
/// records; the negative comes from another speaker.
#[derive(Debug, Clone)]
pub struct Triplet {
    pub anchor: UtteranceRecord,
    pub positive: UtteranceRecord,
    pub negative: UtteranceRecord,
}

/// Draws one speaker-balanced triplet.
///
/// Two distinct speakers are drawn uniformly; two distinct utterances of the
/// first become anchor and positive, one utterance of the second becomes the
/// negative.
pub fn sample_triplet<R: Rng + ?Sized>(corpus: &CorpusIndex, rng: &mut R) -> Result<Triplet, TripletError> {
    let num_speakers = corpus.num_speakers();
    if num_speakers < 2 {
        return Err(TripletError::NotEnoughSpeakers { got: num_speakers });
    }

    let pair = index::sample(rng, num_speakers, 2);
    let (same, other) = (pair.index(0), pair.index(1));

    let same_len = corpus.speaker_len(same);
    if same_len < 2 {
        return Err(TripletError::NotEnoughUtterances {
            speaker: corpus.speakers()[same].clone(),
            got: same_len,
        });
    }
    let picks = index::sample(rng, same_len, 2);
    let negative = rng.gen_range(0..corpus.speaker_len(other));

    Ok(Triplet {
        anchor: corpus.speaker_record(same, picks.index(0)).clone(),
        positive: corpus.speaker_record(same, picks.index(1)).clone(),
        negative: corpus.speaker_record(other, negative).clone(),
    })
}

/// Draws `n` independent triplets.
///
/// Records may repeat across triplets.
pub fn sample_triplets<R: Rng + ?Sized>(
    corpus: &CorpusIndex,
    n: usize,
    rng: &mut R,
) -> Result<Vec<Triplet>, TripletError> {
    let mut triplets = Vec::with_capacity(n);
    for _ in 0..n {
        triplets.push(sample_triplet(corpus, rng)?);
    }
    Ok(triplets)
}
