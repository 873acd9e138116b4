use bpe_core::{BPETrainer, TrainerConfig, Vocabulary};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    // Example: "abaabbaa" and "aabb"
    let sequences: Vec<Vec<usize>> = ["abaabbaa", "aabb"]
        .iter()
        .map(|s| s.bytes().map(usize::from).collect())
        .collect();

    let mut trainer = BPETrainer::new(&sequences, Vocabulary::byte_level(), &TrainerConfig::default())?;
    trainer.log_state();

    trainer.train(3)?;

    println!("Merges:");
    for ((a, b), tok) in trainer.merge_history() {
        let bytes = trainer.vocab().bytes_of(*tok)?;
        println!("  ({a}, {b}) -> {tok} {:?}", String::from_utf8_lossy(bytes));
    }
    println!("Final tokens: {:?}", trainer.encodings());

    Ok(())
}
