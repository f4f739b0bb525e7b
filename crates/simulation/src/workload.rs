//! Vote workload generation for simulations.

use galavote_types::{Program, ProgramDraft, ProgramId};
use rand::Rng;

/// A demo catalog in the shape of a real gala lineup.
///
/// Handy for seeding simulations and examples with a realistic program
/// count.
pub fn demo_program_drafts() -> Vec<ProgramDraft> {
    [
        ("Opening Dance: Dragon Rising", "Dance Troupe"),
        ("Solo: Above the Clouds", "Zhang Wei"),
        ("Sketch: Tales from the Office", "Sales Team"),
        ("Magic: The Miracle Moment", "Li Ming"),
        ("Chorus: A Better Tomorrow", "Executive Team"),
        ("Guzheng Solo: Flowing Waters", "Wang Fang"),
        ("Street Dance: Youth Storm", "Intern Crew"),
        ("Crosstalk: Programmer Humor", "Dev Group"),
        ("Recital: Strive", "Director Li"),
        ("Finale: Unforgettable Tonight", "Everyone"),
    ]
    .iter()
    .enumerate()
    .map(|(i, (name, performer))| {
        ProgramDraft::new(*name, *performer, "", format!("img-{}", i + 10))
    })
    .collect()
}

/// Picks programs for simulated voters with a skewed popularity curve.
///
/// Skew follows the `random^exponent` trick: higher exponents push picks
/// toward the front of the catalog, producing a realistic leader board
/// instead of a flat spread.
#[derive(Debug, Clone)]
pub struct VoteWorkload {
    /// Skew exponent; 1.0 is uniform, 1.5 mildly front-loaded.
    pub skew: f64,
}

impl Default for VoteWorkload {
    fn default() -> Self {
        Self { skew: 1.5 }
    }
}

impl VoteWorkload {
    /// Uniform program selection.
    pub fn uniform() -> Self {
        Self { skew: 1.0 }
    }

    /// Pick a program for one simulated voter.
    pub fn pick(&self, programs: &[Program], rng: &mut impl Rng) -> Option<ProgramId> {
        if programs.is_empty() {
            return None;
        }
        let raw: f64 = rng.gen::<f64>().powf(self.skew);
        let index = ((raw * programs.len() as f64) as usize).min(programs.len() - 1);
        Some(programs[index].id.clone())
    }
}
