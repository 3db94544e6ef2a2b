use serde::{Deserialize, Serialize};
use tabkv::{Column, Table, columns};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Account {
    email: String,
    balance: i64,
    nickname: Option<String>,
}

columns![Account {
    email: String = 1,
    balance: i64 = 2,
    nickname: Option<String> = 3,
}];

fn main() {
    let balance: Column<Account, i64> = Account::BALANCE;
    assert_eq!(balance.name(), "balance");
    assert_eq!(balance.id(), 2);
    assert_eq!(Account::columns().len(), 3);

    let table = Table::builder("account", Account::EMAIL)
        .split()
        .columns(Account::columns())
        .sort(Account::BALANCE)
        .unique(Account::NICKNAME)
        .build();
    assert!(table.is_ok());
}
