// XPF 转写命令行工具
//
// 用法:
//   xpf-transcriber <规则文件路径|规则地址> [单词...]
//   xpf-transcriber --lang <语言代码> [单词...]
//
// 不带单词时逐行读取标准输入

use anyhow::Result;
use std::io::BufRead;

use xpf_transcriber_lib::{
    FetchOptions, ProviderRegistry, RuleSource, TranscriberConfig, XpfEngine, NO_TRANSLATE,
};

const USAGE: &str = "用法: xpf-transcriber <规则文件路径|规则地址> [单词...]\n       xpf-transcriber --lang <语言代码> [单词...]";

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let Some(first) = args.next() else {
        anyhow::bail!("{}", USAGE);
    };

    let engine = if first == "--lang" {
        let Some(code) = args.next() else {
            anyhow::bail!("{}", USAGE);
        };
        let config = TranscriberConfig::load()?;
        let registry = ProviderRegistry::new(config);
        registry.engine_for(&code).await?
    } else if first == "-h" || first == "--help" {
        println!("{}", USAGE);
        return Ok(());
    } else {
        let source = RuleSource::parse(&first);
        std::sync::Arc::new(XpfEngine::from_source(&source, &FetchOptions::default()).await?)
    };

    println!(
        "✓ 规则已加载: {} ({})\n",
        engine.provider_name(),
        engine.language_code()
    );

    let words: Vec<String> = args.collect();
    if !words.is_empty() {
        for word in &words {
            print_word(&engine, word);
        }
        if words.len() > 1 {
            println!("\n{}", engine.transcribe_words(&words));
        }
        return Ok(());
    }

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let output = engine.transcribe_text(&line);
        if output.contains(NO_TRANSLATE) {
            eprintln!("⚠ 存在无法转写的字符: {}", line);
        }
        println!("{}", output);
    }

    Ok(())
}

fn print_word(engine: &XpfEngine, word: &str) {
    let result = engine.transcribe_detailed(word);
    let marker = if result.from_exception { " (例外词)" } else { "" };
    println!("{} → {}{}", word, result.joined(), marker);
    println!("  单元: {}", result.units.join(" | "));
    if result.is_degraded(NO_TRANSLATE) {
        eprintln!("⚠ 存在无法转写的字符: {}", word);
    }
}
