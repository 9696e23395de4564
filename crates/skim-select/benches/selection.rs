use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use skim_core::{CurrentEvent, Jet, Met, Muon, Position, SampleInfo, Vertex};
use skim_select::{BetaCache, GoldenSectionMt2, Kinematics, ObjectSelector, Skimmer, WeightResolver};
use std::hint::black_box;

fn make_event(n_jets: usize) -> CurrentEvent {
    // Deterministic spread of pt / phi so the sort and selection paths do real work.
    let jets = (0..n_jets)
        .map(|i| {
            let pt = 20.0 + ((i * 37) % 200) as f64;
            let phi = (i as f64 * 0.7) % std::f64::consts::PI;
            Jet {
                pt,
                eta: ((i as f64) * 0.31) % 2.3,
                phi,
                px: pt * phi.cos(),
                py: pt * phi.sin(),
                mass: 5.0 + (i % 7) as f64,
                energy: pt * 1.3,
                corr_factor_raw: 0.9,
                csv: ((i * 13) % 100) as f64 / 100.0,
                charged_mult: 4,
                neutral_mult: 3,
                charged_had_energy: 0.5 * pt,
                neutral_had_energy: 0.3 * pt,
                ..Default::default()
            }
        })
        .collect();
    CurrentEvent {
        run: 1,
        event: 1,
        lumiblock: 1,
        jets,
        muons: vec![Muon {
            pt: 35.0,
            px: 35.0,
            global_prompt_tight: true,
            matched_stations: 2,
            valid_pixel_hits: 1,
            tracker_layers: 8,
            ..Default::default()
        }],
        vertices: vec![Vertex { ndof: 12.0, ..Default::default() }],
        beam_spot: Some(Position::default()),
        pf_type1_met: vec![Met { et: 280.0, ex: 200.0, ey: 196.0, phi: 0.775 }],
        raw_met: vec![Met { et: 260.0, ..Default::default() }],
        ..Default::default()
    }
}

fn bench_reduce_event(c: &mut Criterion) {
    let mut group = c.benchmark_group("skim_reduce_event");
    let skimmer = Skimmer::new(WeightResolver::new(Default::default(), 1.0, "SMS"));
    let sample = SampleInfo::new("TTJets_v66");

    for n in [4usize, 12, 40] {
        let ev = make_event(n);
        group.bench_with_input(BenchmarkId::new("jets", n), &ev, |b, ev| {
            b.iter(|| {
                let beta = BetaCache::default();
                black_box(skimmer.reduce_event(ev, &sample, &beta, 1.0))
            })
        });
    }
    group.finish();
}

fn bench_mt2(c: &mut Criterion) {
    let ev = make_event(8);
    let sample = SampleInfo::new("TTJets_v66");
    let beta = BetaCache::default();
    let solver = GoldenSectionMt2::default();
    c.bench_function("skim_mt2_golden_section", |b| {
        b.iter(|| {
            let k = Kinematics::new(ObjectSelector::new(&ev, &sample, &beta));
            black_box(k.mt2(&solver, 80.399))
        })
    });
}

criterion_group!(benches, bench_reduce_event, bench_mt2);
criterion_main!(benches);
