use criterion::{black_box, criterion_group, criterion_main, Criterion};
use edgelik_core::padded_states;
use edgelik_kernel::{
    ChildOperand, ClvView, EdgeEvaluator, EdgeInputs, EvaluatorConfig, FrequencyTable,
    RateCategories, TipCharacterMap, TransitionMatrices,
};

fn random_f64(n: usize, seed: u64) -> Vec<f64> {
    let mut state = seed;
    (0..n)
        .map(|_| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            ((state >> 11) as f64 + 1.0) / (1u64 << 53) as f64
        })
        .collect()
}

struct Edge {
    states: usize,
    sites: usize,
    cats: usize,
    parent: Vec<f64>,
    child: Vec<f64>,
    pmatrix: Vec<f64>,
    freqs: FrequencyTable,
    weights: Vec<f64>,
    freq_idx: Vec<usize>,
    pattern: Vec<u32>,
    codes: Vec<u8>,
    map: TipCharacterMap,
}

impl Edge {
    fn new(map: TipCharacterMap, sites: usize, cats: usize) -> Self {
        let states = map.states();
        let sp = padded_states(states);
        let zero_padding = |mut v: Vec<f64>| {
            for block in v.chunks_exact_mut(sp) {
                block[states..].iter_mut().for_each(|x| *x = 0.0);
            }
            v
        };
        let parent = zero_padding(random_f64(sites * cats * sp, 1));
        let child = zero_padding(random_f64(sites * cats * sp, 2));

        let mut pmatrix = zero_padding(random_f64(cats * sp * sp, 3));
        for (r, row) in pmatrix.chunks_exact_mut(sp).enumerate() {
            if r % sp >= states {
                row.iter_mut().for_each(|x| *x = 0.0);
                continue;
            }
            let total: f64 = row.iter().sum();
            row.iter_mut().for_each(|x| *x /= total);
        }

        let freqs = FrequencyTable::uniform(states).unwrap();
        let weights = vec![1.0 / cats as f64; cats];
        let freq_idx = vec![0; cats];
        let pattern = vec![1; sites];
        let codes = random_f64(sites, 4)
            .into_iter()
            .map(|x| ((x * map.code_count() as f64) as usize).min(map.code_count() - 1) as u8)
            .collect();

        Self {
            states,
            sites,
            cats,
            parent,
            child,
            pmatrix,
            freqs,
            weights,
            freq_idx,
            pattern,
            codes,
            map,
        }
    }

    fn inputs(&self, tip: bool) -> EdgeInputs<'_> {
        let sp = padded_states(self.states);
        let child = if tip {
            ChildOperand::Tip {
                codes: &self.codes,
                map: &self.map,
            }
        } else {
            ChildOperand::Inner {
                clv: ClvView::new(&self.child, self.sites, self.cats, sp).unwrap(),
                scaler: None,
            }
        };
        EdgeInputs {
            states: self.states,
            parent_clv: ClvView::new(&self.parent, self.sites, self.cats, sp).unwrap(),
            parent_scaler: None,
            child,
            pmatrix: TransitionMatrices::new(&self.pmatrix, self.cats, sp).unwrap(),
            frequencies: &self.freqs,
            categories: RateCategories::new(&self.weights, &self.freq_idx).unwrap(),
            invariant: None,
            pattern_weights: &self.pattern,
        }
    }
}

fn sequential(allow_fixed4: bool) -> EdgeEvaluator {
    EdgeEvaluator::new(EvaluatorConfig {
        allow_fixed4,
        parallel_min_sites: usize::MAX,
        ..EvaluatorConfig::default()
    })
    .unwrap()
}

fn bench_nucleotide(c: &mut Criterion) {
    let mut group = c.benchmark_group("edge_dna");

    // 10k patterns x 4 gamma categories
    let edge = Edge::new(TipCharacterMap::nucleotide(), 10_000, 4);
    let fixed4 = sequential(true);
    let generic = sequential(false);

    for (name, tip) in [("tip", true), ("inner", false)] {
        let inputs = edge.inputs(tip);
        group.bench_function(format!("{}_fixed4", name), |b| {
            b.iter(|| fixed4.evaluate(black_box(&inputs)))
        });
        group.bench_function(format!("{}_generic", name), |b| {
            b.iter(|| generic.evaluate(black_box(&inputs)))
        });
    }

    group.finish();
}

fn bench_protein(c: &mut Criterion) {
    let mut group = c.benchmark_group("edge_protein");

    let edge = Edge::new(TipCharacterMap::amino_acid(), 2_000, 4);
    let eval = sequential(true);

    let tip = edge.inputs(true);
    group.bench_function("tip_2k", |b| b.iter(|| eval.evaluate(black_box(&tip))));
    let inner = edge.inputs(false);
    group.bench_function("inner_2k", |b| b.iter(|| eval.evaluate(black_box(&inner))));

    group.finish();
}

#[cfg(feature = "parallel")]
fn bench_parallel(c: &mut Criterion) {
    let mut group = c.benchmark_group("edge_parallel");

    let edge = Edge::new(TipCharacterMap::nucleotide(), 100_000, 4);
    let inputs = edge.inputs(false);
    let seq = sequential(true);
    let par = EdgeEvaluator::default();

    group.bench_function("inner_100k_sequential", |b| {
        b.iter(|| seq.evaluate(black_box(&inputs)))
    });
    group.bench_function("inner_100k_rayon", |b| {
        b.iter(|| par.evaluate(black_box(&inputs)))
    });

    group.finish();
}

#[cfg(feature = "parallel")]
criterion_group!(benches, bench_nucleotide, bench_protein, bench_parallel);
#[cfg(not(feature = "parallel"))]
criterion_group!(benches, bench_nucleotide, bench_protein);
criterion_main!(benches);
