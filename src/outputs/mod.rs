//! Output generation for scraped article batches.
//!
//! One scraped body page produces one artifact: a pretty-printed JSON file
//! holding the page's normalized articles, named after the batch's date and
//! edition:
//!
//! ```text
//! output_dir/
//! ├── Nikkei_2024-01-05_日本経済新聞 朝刊.json
//! └── Nikkei_2024-01-04_日経産業新聞.json
//! ```

pub mod json;
