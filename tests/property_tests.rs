use proptest::prelude::*;
use rust_decimal::Decimal;
use shopcart_rs::models::{
    CartItem, CartItemDraft, ProductDraft, Role, UserDraft, Validate, ValidationError,
    DEFAULT_PHOTO_URL,
};

prop_compose! {
    fn arb_text()(text in "[a-zA-Z0-9][a-zA-Z0-9 ]{0,40}") -> String {
        text
    }
}

prop_compose! {
    fn arb_email()(local in "[a-z0-9.]{1,20}", domain in "[a-z]{1,12}\\.[a-z]{2,4}") -> String {
        format!("{}@{}", local, domain)
    }
}

prop_compose! {
    fn arb_price()(cents in 0u32..10_000_000) -> Decimal {
        Decimal::from_parts(cents, 0, 0, false, 2)
    }
}

prop_compose! {
    fn arb_product_draft()(
        name in arb_text(),
        price in arb_price(),
        description in arb_text(),
        image in arb_text(),
        category in arb_text(),
    ) -> ProductDraft {
        ProductDraft {
            name: Some(name),
            price: Some(price),
            description: Some(description),
            image: Some(image),
            category: Some(category),
        }
    }
}

prop_compose! {
    fn arb_cart_draft()(
        product_id in arb_text(),
        name in arb_text(),
        email in arb_email(),
        image in arb_text(),
        price in arb_price(),
        quantity in 1u32..1000,
    ) -> CartItemDraft {
        CartItemDraft {
            product_id: Some(product_id),
            name: Some(name),
            email: Some(email),
            image: Some(image),
            price: Some(price),
            quantity: Some(quantity),
        }
    }
}

proptest! {
    #[test]
    fn test_complete_product_draft_validates(draft in arb_product_draft()) {
        let fields = draft.validate().unwrap();
        prop_assert_eq!(Some(fields.name), draft.name);
        prop_assert_eq!(Some(fields.price), draft.price);
    }

    #[test]
    fn test_blank_product_field_is_rejected(draft in arb_product_draft(), blank in "[ \t]{0,4}", which in 0usize..4) {
        let mut draft = draft;
        let field = match which {
            0 => { draft.name = Some(blank); "name" }
            1 => { draft.description = Some(blank); "description" }
            2 => { draft.image = Some(blank); "image" }
            _ => { draft.category = Some(blank); "category" }
        };

        prop_assert_eq!(
            draft.validate().unwrap_err(),
            ValidationError::RequiredField { field: field.to_string() }
        );
    }

    #[test]
    fn test_any_price_is_accepted(draft in arb_product_draft(), cents in 0u32..10_000, negative in any::<bool>()) {
        let mut draft = draft;
        let price = Decimal::from_parts(cents, 0, 0, negative, 2);
        draft.price = Some(price);
        prop_assert_eq!(draft.validate().unwrap().price, price);
    }

    #[test]
    fn test_cart_line_total(draft in arb_cart_draft()) {
        let item = CartItem::new(draft.validate().unwrap());
        prop_assert_eq!(item.line_total(), item.price * Decimal::from(item.quantity));
        prop_assert!(item.line_total() >= Decimal::ZERO);
        prop_assert!(item.matches(&item.product_id, &item.email));
    }

    #[test]
    fn test_cart_id_follows_pair(draft in arb_cart_draft(), quantity in 1u32..1000) {
        let first = CartItem::new(draft.validate().unwrap());
        let mut again = draft;
        again.quantity = Some(quantity);
        let second = CartItem::new(again.validate().unwrap());

        prop_assert_eq!(&first.id, &second.id);
        prop_assert_eq!(first.id, CartItem::pair_id(&second.product_id, &second.email));
    }

    #[test]
    fn test_zero_quantity_is_rejected(draft in arb_cart_draft()) {
        let mut draft = draft;
        draft.quantity = Some(0);
        let rejected = matches!(draft.validate(), Err(ValidationError::OutOfRange { .. }));
        prop_assert!(rejected);
    }

    #[test]
    fn test_any_owner_string_is_accepted(draft in arb_cart_draft(), owner in arb_text()) {
        let mut draft = draft;
        draft.email = Some(owner.clone());
        prop_assert_eq!(draft.validate().unwrap().email, owner);
    }

    #[test]
    fn test_new_users_get_defaults(name in arb_text(), email in arb_email()) {
        let user = UserDraft {
            name: Some(name),
            email: Some(email.clone()),
            ..Default::default()
        }
        .into_new_user()
        .unwrap();

        prop_assert_eq!(user.email, email);
        prop_assert_eq!(user.role, Role::User);
        prop_assert_eq!(user.photo_url, DEFAULT_PHOTO_URL);
        prop_assert!(!user.id.is_empty());
    }
}

#[test]
fn test_role_parsing() {
    assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
    assert_eq!("user".parse::<Role>().unwrap(), Role::User);
    assert!("root".parse::<Role>().is_err());
}
