pub fn format_token_amount(amount: u64, decimals: u32) -> String {
    format!(
        "{:.*}",
        decimals as usize,
        amount as f64 / 10f64.powi(decimals as i32)
    )
}

/// Abbreviate a txid for log lines.
pub fn short_txid(txid: &str) -> String {
    if txid.len() <= 12 {
        txid.to_string()
    } else {
        format!("{}..{}", &txid[..6], &txid[txid.len() - 6..])
    }
}
