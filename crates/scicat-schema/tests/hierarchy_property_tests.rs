use std::collections::HashSet;

use proptest::prelude::*;
use scicat_schema::{
    CapabilityInferencer, ClassDescriptor, FamilyRoots, RuntimeClass, RuntimeRegistry,
};

const MODULE: &str = "gen";

fn d(i: usize) -> ClassDescriptor {
    ClassDescriptor::new(MODULE, format!("C{i}"))
}

/// Class 0 is the model root, class 1 the capability root. Every other class
/// picks up to three bases among the classes before it.
fn hierarchy_strategy() -> impl Strategy<Value = Vec<Vec<usize>>> {
    (3usize..14).prop_flat_map(|n| {
        (2..n)
            .map(|i| prop::collection::vec(0..i, 0..=3))
            .collect::<Vec<_>>()
            .prop_map(|bases| {
                let mut all = vec![Vec::new(), Vec::new()];
                all.extend(bases.into_iter().map(|mut b| {
                    let mut seen = HashSet::new();
                    b.retain(|x| seen.insert(*x));
                    b
                }));
                all
            })
    })
}

fn build(bases: &[Vec<usize>]) -> (RuntimeRegistry, FamilyRoots) {
    let reg = RuntimeRegistry::new();
    for (i, bs) in bases.iter().enumerate() {
        reg.register(RuntimeClass::new(MODULE, format!("C{i}")).with_bases(bs.iter().map(|b| d(*b))));
    }
    let roots = FamilyRoots {
        model_root: d(0),
        capability_root: d(1),
    };
    (reg, roots)
}

/// Reachability through declared bases, ignoring resolution order.
fn reaches(bases: &[Vec<usize>], from: usize, to: usize) -> bool {
    let mut stack = vec![from];
    let mut seen = HashSet::new();
    while let Some(c) = stack.pop() {
        if c == to {
            return true;
        }
        if seen.insert(c) {
            stack.extend(bases[c].iter().copied());
        }
    }
    false
}

fn index_of(name: &ClassDescriptor) -> usize {
    name.name()[1..].parse().unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 96,
        failure_persistence: None,
        ..ProptestConfig::default()
    })]

    #[test]
    fn linearization_is_monotonic_and_respects_local_order(bases in hierarchy_strategy()) {
        let (reg, _) = build(&bases);
        for c in 0..bases.len() {
            let Ok(mro) = reg.ancestors(&d(c)) else { continue };
            prop_assert_eq!(&mro[0], &d(c));

            let unique: HashSet<_> = mro.iter().collect();
            prop_assert_eq!(unique.len(), mro.len());

            let positions: Vec<usize> = bases[c]
                .iter()
                .map(|b| mro.iter().position(|x| x == &d(*b)).unwrap())
                .collect();
            prop_assert!(positions.windows(2).all(|w| w[0] < w[1]));

            for base in &bases[c] {
                let sub = reg.ancestors(&d(*base)).unwrap();
                let mut it = mro.iter();
                prop_assert!(sub.iter().all(|x| it.any(|y| y == x)));
            }
        }
    }

    #[test]
    fn inferred_capabilities_match_reachability(bases in hierarchy_strategy()) {
        let (reg, roots) = build(&bases);
        let inferencer = CapabilityInferencer::new(&reg, &roots);
        for c in 0..bases.len() {
            let Ok(mro) = reg.ancestors(&d(c)) else { continue };
            let caps = inferencer.infer(&d(c)).unwrap();

            let unique: HashSet<_> = caps.iter().collect();
            prop_assert_eq!(unique.len(), caps.len());

            let expected: Vec<ClassDescriptor> = mro
                .iter()
                .filter(|a| {
                    let i = index_of(a);
                    i != 1 && reaches(&bases, i, 1) && !reaches(&bases, i, 0)
                })
                .cloned()
                .collect();
            prop_assert_eq!(caps, expected);
        }
    }
}
