use anyhow::Result;
use tracing::{info, warn};

use crate::cli::DeleteArgs;
use crate::store::DeckStore;

pub fn run(args: DeleteArgs) -> Result<()> {
    let store = DeckStore::new(&args.data_root);

    if store.delete_deck(&args.user, &args.title)? {
        info!(user = %args.user, title = %args.title, "delete completed");
    } else {
        warn!(user = %args.user, title = %args.title, "nothing deleted");
    }

    Ok(())
}
