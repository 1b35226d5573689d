//! # CacheHaus Demo
//!
//! Walks through the cache facade against a local Redis:
//! - Single and batch writes with default and per-key expirations
//! - Reads that decode JSON or fall back to raw text
//! - Read-only facades
//! - Deletes and a full flush
//!
//! Start Redis first: docker run -d --name redis -p 6379:6379 redis:7-alpine

use cachehaus::prelude::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🚀 CacheHaus Demo");
    println!("=================");

    let config = CacheConfig::from_url("redis://127.0.0.1:6379")
        .with_kind("redis")
        .with_default_expiration(300);
    let cache = CacheFacade::new(config.clone());

    match cache.ping().await {
        Ok(_) => println!("✅ Redis connection healthy"),
        Err(e) => {
            println!("❌ Redis connection failed: {}", e);
            println!("💡 Please start Redis: docker run -d --name redis -p 6379:6379 redis:7-alpine");
            return Ok(());
        }
    }

    // 1. Single writes
    println!("\n✏️  Single writes");
    cache.set("demo:greeting", "hello", None).await;
    cache
        .set("demo:user", &json!({"name": "Ada", "langs": ["en", "fr"]}), Some(60))
        .await;
    println!("   greeting  -> {:?}", cache.get("demo:greeting").await?);
    println!("   user      -> {:?}", cache.get("demo:user").await?);
    println!("   user ttl  -> {:?}s", cache.ttl("demo:user").await?);

    // 2. Batch writes
    println!("\n📦 Atomic batch");
    let outcome = cache
        .mset(
            [
                ("demo:a", MsetEntry::plain(1)),
                ("demo:b", MsetEntry::expiring("short lived", 15)),
            ],
            None,
        )
        .await;
    println!("   replies   -> {:?}", outcome.applied());
    let values = cache.mget(&["demo:a", "demo:b", "demo:missing"]).await?;
    println!("   mget      -> {} of 3 keys found", values.len());

    // 3. Read-only facade
    println!("\n🔒 Read-only facade");
    let read_only = CacheFacade::new(config.with_read_only(true));
    let outcome = read_only.set("demo:blocked", "nope", None).await;
    println!("   set       -> {:?}", outcome);
    println!("   get       -> {:?}", read_only.get("demo:greeting").await?);

    // 4. Cleanup
    println!("\n🧹 Cleanup");
    let deleted = cache.del(&["demo:a", "demo:b"]).await;
    println!("   deleted   -> {:?}", deleted.applied());
    cache.flush().await;
    println!("   flushed   -> greeting now {:?}", cache.get("demo:greeting").await?);

    cache.close().await;
    read_only.close().await;
    println!("\n✅ Done");
    Ok(())
}
