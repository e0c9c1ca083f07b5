use anyhow::Result;
use convtree::{parse_day, ConversationETL, ExportFormat, PostQuery};
use std::fs;
use std::path::PathBuf;

const DATA_ROOT: &str = "./data";
const OUT_ROOT: &str = "./data_out";

fn main() -> Result<()> {
    let base_dir = PathBuf::from(DATA_ROOT);
    let out_dir = PathBuf::from(OUT_ROOT);
    let hw = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(8);

    // (keyword, since, until); `until` is exclusive
    let windows = [
        ("luna", "2022-05-01", "2022-05-05"),
        ("luna", "2022-05-06", "2022-05-10"),
        ("luna", "2022-05-11", "2022-05-14"),
        ("shib", "2021-08-22", "2021-08-25"),
        ("shib", "2021-08-26", "2021-08-29"),
        ("shib", "2021-08-02", "2021-08-05"),
        ("shib", "2021-08-06", "2021-08-08"),
        ("doge", "2021-12-19", "2021-12-21"),
        ("doge", "2021-02-03", "2021-02-05"),
        ("doge", "2021-02-07", "2021-02-09"),
        ("doge", "2020-12-31", "2021-01-04"),
        ("doge", "2021-01-27", "2021-02-02"),
        ("doge", "2021-04-12", "2021-04-16"),
    ];

    fs::create_dir_all(&out_dir)?;

    let base = ConversationETL::new()
        .base_dir(&base_dir)
        .parallelism(hw)
        .file_concurrency(4)
        .standard_sources()
        .progress(true);

    let corpus = base.clone().progress_label("Loading posts").load_corpus()?;
    println!("Loaded {} posts", corpus.len());

    // Clones share one registry: a thread exported for one coin is not repeated for another.
    for (kw, since, until) in windows {
        let query = PostQuery::new()
            .keyword(kw)
            .language("en")
            .since(parse_day(since).map_err(anyhow::Error::msg)?)
            .until(parse_day(until).map_err(anyhow::Error::msg)?);

        let out = out_dir.join(format!("{kw}_since_{since}_until_{until}.tsv"));
        let summary = base
            .clone()
            .progress_label(format!("{kw} conversations"))
            .export(&corpus, &query, &out, ExportFormat::Tsv)?;
        println!(
            "{kw}: {} conversations, {} single posts, {} rows -> {}",
            summary.conversations,
            summary.single_posts,
            summary.rows,
            out.display()
        );
    }

    Ok(())
}
