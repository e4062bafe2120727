use crate::chain::Chain;
use keel_models::test_exports::TestBlockFactory;

/// Builds a chain from `(block, parent)` name pairs; the first pair's
/// parent becomes the chain root.
pub fn create_test_chain(factory: &mut TestBlockFactory, pairs: &[(&str, &str)]) -> Chain {
    let (_, root_name) = pairs
        .first()
        .expect("a test chain needs at least one block pair");
    let root = factory.create_root(root_name);
    let mut chain = Chain::new(root).expect("test chain root hashing failed");
    for (name, parent) in pairs {
        let block = factory.create_block(name, parent);
        chain
            .add_block(block)
            .expect("test chain block insertion failed");
    }
    chain
}
