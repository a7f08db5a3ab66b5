use proptest::prelude::*;
use scicat_graph::{Entity, GraphBackend, GraphStore, Pattern};

const TYPES: [&str; 3] = ["Model", "Test", "TypeDescription"];
const CONTEXTS: [&str; 3] = ["ctx:a", "ctx:b", "ctx:c"];

fn entity_strategy() -> impl Strategy<Value = (usize, Entity)> {
    (
        0usize..CONTEXTS.len(),
        0u8..12,
        0usize..TYPES.len(),
        prop::option::of(0u8..3),
        prop::collection::vec(0u8..4, 0..3),
    )
        .prop_map(|(ctx, ident, ty, name, targets)| {
            let mut e = Entity::new(format!("urn:e{ident}"), TYPES[ty]);
            if let Some(n) = name {
                e = e.with_attr("name", format!("n{n}"));
            }
            for t in targets {
                e = e.with_link("subclass_of", format!("urn:e{t}"));
            }
            (ctx, e)
        })
}

fn pattern_strategy() -> impl Strategy<Value = Pattern> {
    (
        prop::collection::vec(0usize..TYPES.len(), 0..2),
        prop::option::of(0u8..3),
        prop::option::of(0u8..4),
    )
        .prop_map(|(types, name, target)| {
            let mut p = Pattern::new().of_types(types.into_iter().map(|t| TYPES[t]));
            if let Some(n) = name {
                p = p.with_attr("name", format!("n{n}"));
            }
            if let Some(t) = target {
                p = p.with_link("subclass_of", format!("urn:e{t}"));
            }
            p
        })
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        failure_persistence: None,
        ..ProptestConfig::default()
    })]

    #[test]
    fn indexed_query_agrees_with_linear_scan(
        writes in prop::collection::vec(entity_strategy(), 0..40),
        pattern in pattern_strategy(),
    ) {
        let mut store = GraphStore::new();
        for (ctx, e) in &writes {
            store.put(CONTEXTS[*ctx], e).unwrap();
        }
        let chain: Vec<String> = CONTEXTS.iter().map(|c| c.to_string()).collect();

        // Expected: last write per (context, ident), visited in chain order;
        // an ident present in an earlier context shadows later ones.
        let mut expected: Vec<Entity> = Vec::new();
        let mut shadowed: Vec<String> = Vec::new();
        for (ci, _) in CONTEXTS.iter().enumerate() {
            let mut latest: Vec<Entity> = Vec::new();
            for (ctx, e) in &writes {
                if *ctx != ci {
                    continue;
                }
                match latest.iter_mut().find(|x| x.ident == e.ident) {
                    Some(slot) => *slot = e.clone(),
                    None => latest.push(e.clone()),
                }
            }
            for e in &latest {
                if !shadowed.contains(&e.ident) && pattern.matches(e) {
                    expected.push(e.clone());
                }
            }
            shadowed.extend(latest.into_iter().map(|e| e.ident));
        }

        let actual = store.query(&chain, &pattern).unwrap();
        prop_assert_eq!(actual, expected);
    }
}
