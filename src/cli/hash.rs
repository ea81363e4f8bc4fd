use xinfer::hasher::hash_file;

use crate::utils::errors::DEFAULT_EXIT_CODE;
use crate::{error, HashArgs};

/// Prints one `<digest>  <path>` line per file, in the format of `sha256sum`.
pub(crate) fn hash_cmd(args: &HashArgs) {
    let mut failed = false;

    for path in &args.files {
        match hash_file(path) {
            Ok(digest) => println!("{}  {}", digest, path.display()),
            Err(err) => {
                error!("failed to hash \"{}\": {}", path.display(), err);
                failed = true;
            }
        }
    }

    if failed {
        std::process::exit(DEFAULT_EXIT_CODE);
    }
}
