use std::{
  cell::RefCell,
  rc::Rc,
};

use the_flux::Dispatcher;

#[derive(Debug)]
enum Action {
  SelectCountry(&'static str),
  SelectCity(&'static str),
}

#[derive(Default)]
struct Selection {
  country: Option<&'static str>,
  city:    Option<&'static str>,
  price:   Option<u32>,
}

fn default_city(country: &str) -> &'static str {
  match country {
    "France" => "Paris",
    "Japan" => "Tokyo",
    _ => "Lisbon",
  }
}

fn main() -> anyhow::Result<()> {
  let dispatcher = Dispatcher::<Action>::new();
  let state = Rc::new(RefCell::new(Selection::default()));

  // Registered first, but prices depend on both other stores.
  let price_deps = Rc::new(RefCell::new(Vec::new()));
  let (price_state, deps) = (state.clone(), price_deps.clone());
  dispatcher.register(move |dispatcher, _| {
    dispatcher.wait_for(deps.borrow().iter().copied())?;
    let mut state = price_state.borrow_mut();
    state.price = state.city.map(|city| city.len() as u32 * 100);
    Ok(())
  });

  let country_state = state.clone();
  let country = dispatcher.register(move |_, action| {
    if let Action::SelectCountry(country) = action {
      country_state.borrow_mut().country = Some(*country);
    }
    Ok(())
  });

  let city_state = state.clone();
  let city = dispatcher.register(move |dispatcher, action| {
    match action {
      Action::SelectCountry(_) => {
        dispatcher.wait_for([country])?;
        let mut state = city_state.borrow_mut();
        state.city = state.country.map(default_city);
      },
      Action::SelectCity(city) => city_state.borrow_mut().city = Some(*city),
    }
    Ok(())
  });

  price_deps.borrow_mut().extend([country, city]);

  dispatcher.dispatch(Action::SelectCountry("France"))?;
  print(&state);
  dispatcher.dispatch(Action::SelectCity("Lyon"))?;
  print(&state);
  dispatcher.dispatch(Action::SelectCountry("Japan"))?;
  print(&state);
  Ok(())
}

fn print(state: &RefCell<Selection>) {
  let state = state.borrow();
  println!(
    "country: {:?}, city: {:?}, price: {:?}",
    state.country, state.city, state.price
  );
}
